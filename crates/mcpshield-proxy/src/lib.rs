//! # mcpshield-proxy
//!
//! The MCP fan-out engine. One JSON-RPC endpoint aggregates an arbitrary set
//! of upstream MCP servers: their tool catalogues are merged under the
//! collision-free `ms_<server>_<tool>` namespace, and each `tools/call` is
//! routed back to the upstream that owns the tool.
//!
//! ```text
//! client ──► ProxyCore ──► AggregateRegistry ──► UpstreamServer ──► UpstreamRuntime ──► container stdio
//! ```

mod error;
pub mod proxy;
pub mod registry;
pub mod tool;
pub mod upstream;

pub use error::ProxyError;
pub use proxy::ProxyCore;
pub use registry::AggregateRegistry;
pub use tool::{parse_public_name, ToolEntry, ToolRegistry};
pub use upstream::UpstreamServer;

/// MCP protocol version the proxy speaks on both sides.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Client identity presented to upstreams and server identity presented to
/// clients.
pub const PROXY_NAME: &str = "mcpshield-proxy";

/// Proxy version, from the crate manifest.
pub const PROXY_VERSION: &str = env!("CARGO_PKG_VERSION");
