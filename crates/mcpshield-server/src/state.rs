//! Application state.

use std::sync::Arc;

use mcpshield_proxy::ProxyCore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<ProxyCore>,
}

impl AppState {
    pub fn new(proxy: Arc<ProxyCore>) -> Self {
        Self { proxy }
    }
}
