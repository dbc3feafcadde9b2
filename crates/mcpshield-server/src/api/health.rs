//! Health and metrics endpoints.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        time: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<AppState>) -> String {
    let configured = state.proxy.server_count();
    let ready = state.proxy.ready_count().await;
    let tools = state.proxy.registry().tool_count().await;

    // Prometheus format
    format!(
        r#"# HELP mcpshield_upstreams_configured Number of configured upstream MCP servers
# TYPE mcpshield_upstreams_configured gauge
mcpshield_upstreams_configured {configured}

# HELP mcpshield_upstreams_ready Number of upstream MCP servers reporting ready
# TYPE mcpshield_upstreams_ready gauge
mcpshield_upstreams_ready {ready}

# HELP mcpshield_tools_aggregated Number of tools in the merged catalogue
# TYPE mcpshield_tools_aggregated gauge
mcpshield_tools_aggregated {tools}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_healthy_with_rfc3339_time() {
        let Json(response) = health_check().await;
        assert_eq!(response.status, "healthy");
        assert!(chrono::DateTime::parse_from_rfc3339(&response.time).is_ok());
    }
}
