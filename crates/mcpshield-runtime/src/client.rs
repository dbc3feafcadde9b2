//! Orchestrator capability boundary.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeError;

/// Everything the orchestrator needs to launch one upstream workload.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    /// Workload name, unique within the namespace
    pub name: String,
    /// Container image
    pub image: String,
    /// Entrypoint command
    pub command: String,
    /// Entrypoint arguments
    pub args: Vec<String>,
    /// Environment, already expanded against the host environment
    pub env: HashMap<String, String>,
}

/// Captured output of a remote exec.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Full standard output
    pub stdout: String,
    /// Full standard error
    pub stderr: String,
}

/// Narrow contract over a container orchestrator.
///
/// No orchestrator-specific types cross this boundary: workloads are
/// addressed by name, instances by an opaque id. Every potentially blocking
/// operation takes a [`CancellationToken`] and aborts mid-wait when it fires.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    /// Launch a single-replica workload that keeps its entrypoint attached
    /// to stdin and restarts on failure.
    async fn create_workload(
        &self,
        spec: &WorkloadSpec,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;

    /// Whether a workload with this name currently exists.
    async fn workload_exists(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, RuntimeError>;

    /// Poll until the workload reports ready-replica parity.
    async fn wait_ready(&self, name: &str, cancel: &CancellationToken)
        -> Result<(), RuntimeError>;

    /// Ready-replica parity right now.
    async fn is_ready(&self, name: &str) -> bool;

    /// Order deletion with foreground propagation.
    async fn delete_workload(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;

    /// Poll until lookup of the workload returns not-found.
    async fn wait_gone(&self, name: &str, cancel: &CancellationToken) -> Result<(), RuntimeError>;

    /// Id of one live instance backing the workload, preferring a running
    /// one.
    async fn resolve_instance(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RuntimeError>;

    /// Poll until the instance is running and container-ready. A terminal
    /// failure phase errors immediately.
    async fn wait_instance_ready(
        &self,
        instance: &str,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError>;

    /// Run a command inside the instance, capturing full stdout and stderr.
    async fn exec(
        &self,
        instance: &str,
        command: &[String],
        cancel: &CancellationToken,
    ) -> Result<ExecOutput, RuntimeError>;
}
