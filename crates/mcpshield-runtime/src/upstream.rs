//! Per-upstream workload runtime.
//!
//! One [`UpstreamRuntime`] exclusively owns one orchestrator workload. The
//! exec bridge is per-call: every request opens a fresh pipe into the
//! long-running container, so request/response pairing is naturally ordered
//! per call and concurrent calls ride independent streams.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mcpshield_core::UpstreamSpec;

use crate::client::{OrchestratorClient, WorkloadSpec};
use crate::error::RuntimeError;

const WORKLOAD_NAME_PREFIX: &str = "mcp-";
const WORKLOAD_NAME_MAX: usize = 40;

/// Lifecycle manager and stdio bridge for one upstream MCP server.
pub struct UpstreamRuntime {
    orchestrator: Arc<dyn OrchestratorClient>,
    spec: UpstreamSpec,
    workload_name: String,
}

impl UpstreamRuntime {
    /// Bind an upstream spec to an orchestrator. The workload name is derived
    /// deterministically from the image so restarts of the proxy find (and
    /// replace) their own leftovers.
    pub fn new(orchestrator: Arc<dyn OrchestratorClient>, spec: UpstreamSpec) -> Self {
        let workload_name = workload_name(&spec.image);
        Self {
            orchestrator,
            spec,
            workload_name,
        }
    }

    /// Derived workload name.
    pub fn workload_name(&self) -> &str {
        &self.workload_name
    }

    /// Launch the workload and wait until it is ready.
    ///
    /// Idempotent: an existing workload with the same name is deleted first —
    /// the system never reuses a workload whose state it does not trust. On
    /// readiness timeout or creation error the workload is best-effort
    /// deleted before the error surfaces.
    ///
    /// # Errors
    /// Returns an error if creation fails or readiness is not reached.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        let name = &self.workload_name;

        if self.orchestrator.workload_exists(name, cancel).await? {
            info!(workload = %name, "replacing existing workload");
            self.orchestrator.delete_workload(name, cancel).await?;
            self.orchestrator.wait_gone(name, cancel).await?;
        }

        let workload = WorkloadSpec {
            name: name.clone(),
            image: self.spec.image.clone(),
            command: self.spec.command.clone(),
            args: self.spec.args.clone(),
            env: self.spec.expanded_env(),
        };
        self.orchestrator.create_workload(&workload, cancel).await?;

        if let Err(e) = self.orchestrator.wait_ready(name, cancel).await {
            warn!(workload = %name, error = %e, "workload not ready, tearing down");
            // Fresh token: the teardown must run even when `cancel` fired.
            let teardown = CancellationToken::new();
            if let Err(delete_err) = self.orchestrator.delete_workload(name, &teardown).await {
                debug!(workload = %name, error = %delete_err, "teardown after failed start");
            }
            return Err(e);
        }

        Ok(())
    }

    /// Pipe one JSON-RPC frame into the container and return the stdout it
    /// produced. Non-zero exit or stream failure carries stderr in the error.
    ///
    /// # Errors
    /// Returns an error if no instance is live or the exec fails.
    pub async fn exec(
        &self,
        frame: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, RuntimeError> {
        let instance = self
            .orchestrator
            .resolve_instance(&self.workload_name, cancel)
            .await?;
        self.orchestrator
            .wait_instance_ready(&instance, cancel)
            .await?;

        let mut cmdline = self.spec.command.clone();
        for arg in &self.spec.args {
            cmdline.push(' ');
            cmdline.push_str(arg);
        }
        let frame = String::from_utf8_lossy(frame);
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("echo '{frame}' | {cmdline}"),
        ];

        debug!(workload = %self.workload_name, instance = %instance, "exec frame");
        let output = self.orchestrator.exec(&instance, &command, cancel).await?;
        Ok(output.stdout.into_bytes())
    }

    /// Delete the workload and wait for removal. Safe to call when the
    /// workload was never created or is already gone.
    ///
    /// # Errors
    /// Returns an error if deletion is ordered but never completes.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<(), RuntimeError> {
        let name = &self.workload_name;
        match self.orchestrator.workload_exists(name, cancel).await {
            Ok(false) | Err(_) => return Ok(()),
            Ok(true) => {}
        }
        self.orchestrator.delete_workload(name, cancel).await?;
        self.orchestrator.wait_gone(name, cancel).await
    }

    /// Ready-replica parity of the workload.
    pub async fn is_ready(&self) -> bool {
        self.orchestrator.is_ready(&self.workload_name).await
    }
}

/// Clean an image reference into a valid workload name: lowercase, `:` and
/// `/` flattened to `-`, capped, and prefixed with `mcp-`.
fn workload_name(image: &str) -> String {
    let mut name = image.to_lowercase().replace([':', '/'], "-");
    name.truncate(WORKLOAD_NAME_MAX);
    format!("{WORKLOAD_NAME_PREFIX}{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_name_sanitizes_image() {
        assert_eq!(workload_name("a:1"), "mcp-a-1");
        assert_eq!(
            workload_name("ghcr.io/Acme/Search:2.0"),
            "mcp-ghcr.io-acme-search-2.0"
        );
    }

    #[test]
    fn workload_name_caps_length() {
        let long = "registry.example.com/some/very/long/image/path/name:latest";
        let name = workload_name(long);
        assert!(name.len() <= WORKLOAD_NAME_PREFIX.len() + WORKLOAD_NAME_MAX);
        assert!(name.starts_with("mcp-"));
    }
}
