//! # mcpshield-server
//!
//! HTTP front door for the mcpshield proxy:
//! - `POST /mcp` — the single JSON-RPC endpoint
//! - `GET /health` — liveness probe
//! - `GET /metrics` — Prometheus gauges
//! - `/auth` — authentication placeholder

pub mod api;
pub mod auth;
pub mod state;

pub use api::create_router;
pub use state::AppState;
