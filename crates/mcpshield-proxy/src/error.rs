//! Proxy error types.
//!
//! Every variant that reaches the request path is rendered into a JSON-RPC
//! error object with code `-32603`; the Display text becomes the message.

use thiserror::Error;

use mcpshield_runtime::RuntimeError;

/// Errors from the fan-out engine.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// `call` before `start`
    #[error("server not started")]
    NotStarted,

    /// The server's cancellation token already fired
    #[error("server context cancelled")]
    Cancelled,

    /// Upstream exists but does not report ready
    #[error("server not ready: {0}")]
    NotReady(String),

    /// Request frame could not be encoded
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Workload or exec-bridge failure
    #[error("runtime exec failed: {0}")]
    Runtime(#[from] RuntimeError),

    /// Upstream stdout was not a JSON-RPC frame
    #[error("failed to decode response from server {server}: {reason}; output: {output:?}")]
    Decode {
        /// Owning upstream
        server: String,
        /// Parse failure description
        reason: String,
        /// Raw upstream stdout
        output: String,
    },

    /// `tools/list` returned no result object
    #[error("no response result from server {0}")]
    EmptyResult(String),

    /// `tools/list` result had an unexpected shape
    #[error("invalid response format from server {0}")]
    InvalidResult(String),

    /// `tools/call` without `params.name`
    #[error("missing tool name in request")]
    MissingToolName,

    /// Public tool name not present in the aggregate registry
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// MCP verb outside the supported set
    #[error("method not implemented: {0}")]
    MethodNotImplemented(String),

    /// Startup retry budget exhausted
    #[error("failed to start MCP servers after {0} attempts")]
    StartupExhausted(u32),
}
