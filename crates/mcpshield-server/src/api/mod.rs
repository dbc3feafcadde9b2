//! API routes.

pub mod health;
pub mod mcp;

use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// Authentication placeholder route.
async fn auth_placeholder() -> Json<Value> {
    Json(json!({
        "message": "Authentication placeholder",
        "status": "not implemented",
    }))
}

/// Create the main API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Single JSON-RPC endpoint; non-POST methods are answered with a
        // JSON-RPC error, so every method lands on the same handler.
        .route("/mcp", any(mcp::handle))
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .route("/auth", any(auth_placeholder))
        .with_state(state)
}
