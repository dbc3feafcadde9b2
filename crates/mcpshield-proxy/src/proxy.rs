//! Startup/shutdown choreography and request dispatch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mcpshield_core::{MCPRequest, MCPResponse, UpstreamSpec, INTERNAL_ERROR};
use mcpshield_runtime::OrchestratorClient;

use crate::error::ProxyError;
use crate::registry::AggregateRegistry;
use crate::upstream::UpstreamServer;
use crate::{PROTOCOL_VERSION, PROXY_NAME, PROXY_VERSION};

const MAX_START_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);

/// First line of the aggregated `instructions` string.
const PROXY_BANNER: &str = "MCP Shield Proxy - Aggregates tools from multiple MCP servers";

/// The orchestration brain: owns the fleet of upstream servers, starts and
/// stops them as a unit, and dispatches the three MCP verbs.
pub struct ProxyCore {
    servers: Vec<Arc<UpstreamServer>>,
    registry: AggregateRegistry,
}

impl ProxyCore {
    /// Build the fleet from upstream specs, all sharing one orchestrator.
    pub fn new(specs: Vec<UpstreamSpec>, orchestrator: Arc<dyn OrchestratorClient>) -> Self {
        let servers: Vec<Arc<UpstreamServer>> = specs
            .into_iter()
            .map(|spec| Arc::new(UpstreamServer::new(spec, Arc::clone(&orchestrator))))
            .collect();
        let registry = AggregateRegistry::new(servers.clone());
        Self { servers, registry }
    }

    /// Number of configured upstreams.
    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Number of upstreams currently reporting ready.
    pub async fn ready_count(&self) -> usize {
        let mut count = 0;
        for server in &self.servers {
            if server.is_ready().await {
                count += 1;
            }
        }
        count
    }

    /// The fleet-wide tool index.
    pub fn registry(&self) -> &AggregateRegistry {
        &self.registry
    }

    /// Server by name.
    pub fn server(&self, name: &str) -> Option<&Arc<UpstreamServer>> {
        self.servers.iter().find(|s| s.name() == name)
    }

    /// Start every upstream, with up to three attempts and a linear backoff
    /// of `attempt x 5s` between them. A failed attempt tears down everything
    /// it started before the retry; a half-initialized fleet is never served.
    ///
    /// # Errors
    /// Fails once the retry budget is exhausted or the token is cancelled.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), ProxyError> {
        info!("starting MCP servers");

        for attempt in 0..MAX_START_ATTEMPTS {
            if attempt > 0 {
                let delay = RETRY_BASE_DELAY * attempt;
                info!(
                    attempt = attempt + 1,
                    max = MAX_START_ATTEMPTS,
                    delay_secs = delay.as_secs(),
                    "retrying MCP server startup"
                );
                tokio::select! {
                    () = cancel.cancelled() => return Err(ProxyError::Cancelled),
                    () = tokio::time::sleep(delay) => {}
                }
            }

            match self.start_all(cancel).await {
                Ok(()) => {
                    info!(servers = self.servers.len(), "all MCP servers started");
                    self.log_catalogue().await;
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "MCP server startup failed");
                    self.stop_all(cancel).await;
                }
            }
        }

        Err(ProxyError::StartupExhausted(MAX_START_ATTEMPTS))
    }

    /// One startup attempt: launch every server, verify readiness, then
    /// refresh tool and initialize registries. Refresh failures fail the
    /// attempt and so participate in the retry budget.
    async fn start_all(&self, cancel: &CancellationToken) -> Result<(), ProxyError> {
        for server in &self.servers {
            info!(server = %server.name(), "starting MCP server");
            server.start(cancel).await?;
            if !server.is_ready().await {
                return Err(ProxyError::NotReady(server.name().to_string()));
            }
        }

        for server in &self.servers {
            server.refresh_tools().await?;
            server.refresh_initialize().await?;
        }

        Ok(())
    }

    /// Stop every upstream. Best-effort: failures are logged by the servers
    /// themselves, never surfaced. Safe to call repeatedly and after a failed
    /// start.
    pub async fn stop(&self, cancel: &CancellationToken) {
        info!("stopping MCP servers");
        self.stop_all(cancel).await;
        info!("all MCP servers stopped");
    }

    async fn stop_all(&self, cancel: &CancellationToken) {
        for server in &self.servers {
            server.stop(cancel).await;
        }
    }

    async fn log_catalogue(&self) {
        for server in &self.servers {
            for entry in server.registry().entries().await {
                info!(
                    server = %entry.server(),
                    tool = %entry.original_name(),
                    public = %entry.public_name(),
                    "registered tool"
                );
            }
        }
    }

    /// Dispatch one JSON-RPC frame. Never fails: every error becomes a
    /// JSON-RPC error response (code `-32603`) echoing the request id.
    pub async fn handle_request(&self, request: MCPRequest) -> MCPResponse {
        let id = request.id.clone();
        let result = match request.method.as_str() {
            "initialize" => self.process_initialize(&request).await,
            "notifications/initialized" => Ok(MCPResponse {
                jsonrpc: "2.0".to_string(),
                id: id.clone(),
                result: None,
                error: None,
            }),
            "tools/list" => self.process_list(&request).await,
            "tools/call" => self.process_call(request.clone()).await,
            other => Err(ProxyError::MethodNotImplemented(other.to_string())),
        };

        match result {
            Ok(response) => response,
            Err(e) => MCPResponse::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }

    /// Aggregate the cached `initialize` responses: capabilities merged
    /// key-by-key over a `tools.listChanged` base (last writer wins),
    /// instructions concatenated behind the proxy banner.
    async fn process_initialize(&self, request: &MCPRequest) -> Result<MCPResponse, ProxyError> {
        let mut capabilities = Map::new();
        capabilities.insert("tools".to_string(), json!({ "listChanged": true }));
        let mut instructions = vec![PROXY_BANNER.to_string()];

        for server in &self.servers {
            let Some(record) = server.initialize_record().await else {
                continue;
            };
            let Some(result) = record.result.as_ref().and_then(Value::as_object) else {
                continue;
            };

            if let Some(caps) = result.get("capabilities").and_then(Value::as_object) {
                for (key, value) in caps {
                    capabilities.insert(key.clone(), value.clone());
                }
            }
            if let Some(text) = result.get("instructions").and_then(Value::as_str) {
                if !text.is_empty() {
                    instructions.push(text.to_string());
                }
            }
        }

        Ok(MCPResponse::success(
            request.id.clone(),
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": capabilities,
                "serverInfo": {
                    "name": PROXY_NAME,
                    "version": PROXY_VERSION,
                },
                "instructions": instructions.join("\n"),
            }),
        ))
    }

    /// Serve the merged catalogue from the registry; no upstream round-trip.
    async fn process_list(&self, request: &MCPRequest) -> Result<MCPResponse, ProxyError> {
        Ok(MCPResponse::success(
            request.id.clone(),
            json!({ "tools": self.registry.list().await }),
        ))
    }

    /// Route a tool call: resolve the public name, rewrite `params.name` to
    /// the upstream's original name, dispatch, and forward the response with
    /// the incoming id preserved.
    async fn process_call(&self, mut request: MCPRequest) -> Result<MCPResponse, ProxyError> {
        let public_name = request
            .tool_name()
            .map(str::to_string)
            .ok_or(ProxyError::MissingToolName)?;

        let (server, original_name) = self
            .registry
            .lookup(&public_name)
            .await
            .ok_or_else(|| ProxyError::ToolNotFound(public_name.clone()))?;

        if !server.is_ready().await {
            return Err(ProxyError::NotReady(server.name().to_string()));
        }

        if let Some(params) = request.params.as_mut().and_then(Value::as_object_mut) {
            params.insert("name".to_string(), Value::String(original_name));
        }

        let mut response = server.call(&request).await?;
        response.id = request.id;
        Ok(response)
    }
}
