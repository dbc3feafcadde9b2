//! Fleet-wide tool index.
//!
//! Not a persistent store: a view over the per-server registries, which are
//! populated by `refresh_tools` at startup.

use std::sync::Arc;

use serde_json::Value;

use crate::upstream::UpstreamServer;

/// Merged catalogue and reverse routing across all upstreams.
pub struct AggregateRegistry {
    servers: Vec<Arc<UpstreamServer>>,
}

impl AggregateRegistry {
    /// View over a fixed set of servers.
    pub fn new(servers: Vec<Arc<UpstreamServer>>) -> Self {
        Self { servers }
    }

    /// Merged catalogue: every upstream's tool definitions with `name`
    /// rewritten to the public form, sorted by public name.
    pub async fn list(&self) -> Vec<Value> {
        let mut tools = Vec::new();
        for server in &self.servers {
            tools.extend(server.registry().list().await);
        }
        tools.sort_by(|a, b| {
            a.get("name")
                .and_then(Value::as_str)
                .cmp(&b.get("name").and_then(Value::as_str))
        });
        tools
    }

    /// Resolve a public tool name to its owning server and original name.
    pub async fn lookup(&self, public_name: &str) -> Option<(Arc<UpstreamServer>, String)> {
        for server in &self.servers {
            if let Some(entry) = server.registry().find(public_name).await {
                return Some((Arc::clone(server), entry.original_name().to_string()));
            }
        }
        None
    }

    /// Total number of aggregated tools.
    pub async fn tool_count(&self) -> usize {
        let mut count = 0;
        for server in &self.servers {
            count += server.registry().len().await;
        }
        count
    }
}
