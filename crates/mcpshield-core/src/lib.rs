//! # mcpshield-core
//!
//! Shared foundation for the mcpshield proxy: the YAML configuration model
//! and the JSON-RPC 2.0 frame types that flow between the client, the proxy,
//! and the upstream MCP servers.

pub mod config;
mod error;
pub mod rpc;

pub use config::{Config, KubernetesConfig, LogConfig, RuntimeConfig, ServerConfig, UpstreamSpec};
pub use error::ConfigError;
pub use rpc::{MCPRequest, MCPResponse, RPCError, INTERNAL_ERROR};
