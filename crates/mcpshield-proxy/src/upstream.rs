//! MCP-level wrapper around one upstream runtime.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mcpshield_core::{MCPRequest, MCPResponse, UpstreamSpec};
use mcpshield_runtime::{OrchestratorClient, UpstreamRuntime};

use crate::error::ProxyError;
use crate::tool::{ToolEntry, ToolRegistry};
use crate::{PROTOCOL_VERSION, PROXY_NAME, PROXY_VERSION};

/// One upstream MCP server: owns the runtime, the per-server tool registry,
/// and the cached `initialize` response.
pub struct UpstreamServer {
    spec: UpstreamSpec,
    runtime: Arc<UpstreamRuntime>,
    tools: ToolRegistry,
    init: RwLock<Option<MCPResponse>>,
    cancel: RwLock<Option<CancellationToken>>,
}

impl UpstreamServer {
    /// Bind a spec to an orchestrator.
    pub fn new(spec: UpstreamSpec, orchestrator: Arc<dyn OrchestratorClient>) -> Self {
        let runtime = Arc::new(UpstreamRuntime::new(orchestrator, spec.clone()));
        Self {
            spec,
            runtime,
            tools: ToolRegistry::new(),
            init: RwLock::new(None),
            cancel: RwLock::new(None),
        }
    }

    /// Upstream name (the routing key inside public tool names).
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Per-server tool registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Start the workload under a child token of `parent` and spawn a watcher
    /// that tears the workload down once the token is cancelled, so cleanup
    /// happens on parent shutdown even without an explicit `stop`.
    ///
    /// # Errors
    /// Returns an error if the workload cannot be launched.
    pub async fn start(&self, parent: &CancellationToken) -> Result<(), ProxyError> {
        let token = parent.child_token();
        self.runtime.start(&token).await?;
        *self.cancel.write().await = Some(token.clone());

        let runtime = Arc::clone(&self.runtime);
        let name = self.spec.name.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            // A fresh token so the teardown itself cannot be aborted.
            let cleanup = CancellationToken::new();
            if let Err(e) = runtime.stop(&cleanup).await {
                warn!(server = %name, error = %e, "cleanup after cancellation failed");
            }
        });

        Ok(())
    }

    /// Cancel the server's token and tear down the workload. Best-effort and
    /// idempotent; failures are logged, never returned.
    pub async fn stop(&self, cancel: &CancellationToken) {
        if let Some(token) = self.cancel.read().await.as_ref() {
            token.cancel();
        }
        if let Err(e) = self.runtime.stop(cancel).await {
            warn!(server = %self.spec.name, error = %e, "failed to stop workload");
        }
    }

    /// Whether the server was started, not cancelled, and its workload
    /// reports ready.
    pub async fn is_ready(&self) -> bool {
        match self.cancel.read().await.as_ref() {
            None => false,
            Some(token) if token.is_cancelled() => false,
            Some(_) => self.runtime.is_ready().await,
        }
    }

    /// Send one JSON-RPC frame to the upstream and decode the reply.
    ///
    /// # Errors
    /// Fails if the server was never started or is cancelled, if the exec
    /// bridge fails, or if the upstream stdout is not a JSON-RPC frame.
    pub async fn call(&self, request: &MCPRequest) -> Result<MCPResponse, ProxyError> {
        let token = {
            let guard = self.cancel.read().await;
            match guard.as_ref() {
                None => return Err(ProxyError::NotStarted),
                Some(token) if token.is_cancelled() => return Err(ProxyError::Cancelled),
                Some(token) => token.clone(),
            }
        };

        let frame = serde_json::to_vec(request).map_err(|e| ProxyError::Encode(e.to_string()))?;
        let reply = self.runtime.exec(&frame, &token).await?;

        serde_json::from_slice(&reply).map_err(|e| ProxyError::Decode {
            server: self.spec.name.clone(),
            reason: e.to_string(),
            output: String::from_utf8_lossy(&reply).into_owned(),
        })
    }

    /// Ask the upstream for its tool list and register every well-formed
    /// entry. Malformed tool objects are skipped; an absent `tools` array is
    /// not an error.
    ///
    /// # Errors
    /// Fails if the upstream is not ready or the round-trip fails.
    pub async fn refresh_tools(&self) -> Result<(), ProxyError> {
        if !self.is_ready().await {
            return Err(ProxyError::NotReady(self.spec.name.clone()));
        }

        let response = self.call(&MCPRequest::new(1, "tools/list", None)).await?;
        let result = response
            .result
            .ok_or_else(|| ProxyError::EmptyResult(self.spec.name.clone()))?;
        let result = result
            .as_object()
            .ok_or_else(|| ProxyError::InvalidResult(self.spec.name.clone()))?;

        let Some(tools) = result.get("tools").and_then(Value::as_array) else {
            return Ok(());
        };

        for tool in tools {
            let Some(definition) = tool.as_object() else {
                continue;
            };
            let Some(name) = definition.get("name").and_then(Value::as_str) else {
                continue;
            };
            self.tools
                .update(ToolEntry::new(&self.spec.name, name, definition.clone()))
                .await;
        }

        let registered = self.tools.len().await;
        debug!(server = %self.spec.name, tools = registered, "tool registry refreshed");
        Ok(())
    }

    /// Run the MCP `initialize` handshake with the proxy's fixed client
    /// identity and cache the whole response.
    ///
    /// # Errors
    /// Fails if the upstream is not ready or the round-trip fails.
    pub async fn refresh_initialize(&self) -> Result<(), ProxyError> {
        if !self.is_ready().await {
            return Err(ProxyError::NotReady(self.spec.name.clone()));
        }

        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": PROXY_NAME,
                "version": PROXY_VERSION,
            },
        });
        let response = self
            .call(&MCPRequest::new(1, "initialize", Some(params)))
            .await?;

        *self.init.write().await = Some(response);
        info!(server = %self.spec.name, "initialize response cached");
        Ok(())
    }

    /// Cached `initialize` response, if any.
    pub async fn initialize_record(&self) -> Option<MCPResponse> {
        self.init.read().await.clone()
    }
}
