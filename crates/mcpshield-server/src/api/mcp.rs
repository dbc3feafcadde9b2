//! The JSON-RPC endpoint.
//!
//! Transport errors never become HTTP errors: the status is always 200 and
//! failures ride the JSON-RPC `error` field, which is what MCP clients
//! expect from a streamable endpoint.

use axum::extract::State;
use axum::http::Method;
use axum::Json;
use serde_json::json;

use mcpshield_core::{MCPRequest, MCPResponse, INTERNAL_ERROR};

use crate::state::AppState;

/// Any-method handler for `/mcp`.
pub async fn handle(
    State(state): State<AppState>,
    method: Method,
    body: String,
) -> Json<MCPResponse> {
    if method != Method::POST {
        return Json(MCPResponse::error(
            json!(1),
            INTERNAL_ERROR,
            "Method not allowed",
        ));
    }

    let request: MCPRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            return Json(MCPResponse::error(json!(1), INTERNAL_ERROR, e.to_string()));
        }
    };

    Json(state.proxy.handle_request(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use mcpshield_proxy::ProxyCore;
    use mcpshield_runtime::{ExecOutput, OrchestratorClient, RuntimeError, WorkloadSpec};

    struct NoopOrchestrator;

    #[async_trait]
    impl OrchestratorClient for NoopOrchestrator {
        async fn create_workload(
            &self,
            _spec: &WorkloadSpec,
            _cancel: &CancellationToken,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn workload_exists(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<bool, RuntimeError> {
            Ok(false)
        }

        async fn wait_ready(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn is_ready(&self, _name: &str) -> bool {
            true
        }

        async fn delete_workload(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn wait_gone(
            &self,
            _name: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn resolve_instance(
            &self,
            name: &str,
            _cancel: &CancellationToken,
        ) -> Result<String, RuntimeError> {
            Err(RuntimeError::NoInstances(name.to_string()))
        }

        async fn wait_instance_ready(
            &self,
            _instance: &str,
            _cancel: &CancellationToken,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn exec(
            &self,
            _instance: &str,
            _command: &[String],
            _cancel: &CancellationToken,
        ) -> Result<ExecOutput, RuntimeError> {
            Err(RuntimeError::ExecFailed {
                message: "no exec in tests".to_string(),
                stderr: String::new(),
            })
        }
    }

    fn empty_state() -> AppState {
        AppState::new(Arc::new(ProxyCore::new(vec![], Arc::new(NoopOrchestrator))))
    }

    #[tokio::test]
    async fn non_post_method_gets_json_rpc_error() {
        let Json(response) = handle(
            State(empty_state()),
            Method::GET,
            String::new(),
        )
        .await;

        let error = response.error.unwrap();
        assert_eq!(error.code, INTERNAL_ERROR);
        assert_eq!(error.message, "Method not allowed");
    }

    #[tokio::test]
    async fn malformed_body_gets_json_rpc_error() {
        let Json(response) = handle(
            State(empty_state()),
            Method::POST,
            "{not json".to_string(),
        )
        .await;

        assert!(response.error.is_some());
        assert_eq!(response.id, json!(1));
    }

    #[tokio::test]
    async fn valid_request_is_dispatched() {
        let body = r#"{"jsonrpc":"2.0","id":"req-42","method":"tools/list"}"#;
        let Json(response) = handle(State(empty_state()), Method::POST, body.to_string()).await;

        assert_eq!(response.id, json!("req-42"));
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["tools"], json!([]));
    }
}
