//! JSON-RPC 2.0 frame types.
//!
//! Both directions of the proxy speak the same frames: the client posts a
//! request to `/mcp`, and the same encoded shape is piped into the upstream
//! container. Ids are opaque JSON scalars (number, string, or null) and are
//! always echoed back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC internal error code. Every proxy-side failure maps here.
pub const INTERNAL_ERROR: i64 = -32603;

/// A JSON-RPC 2.0 request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl MCPRequest {
    /// Build a request frame.
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// The `params.name` of a `tools/call` request, if present.
    pub fn tool_name(&self) -> Option<&str> {
        if self.method != "tools/call" {
            return None;
        }
        self.params.as_ref()?.get("name")?.as_str()
    }
}

/// A JSON-RPC 2.0 response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RPCError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RPCError {
    pub code: i64,
    pub message: String,
}

impl MCPResponse {
    /// Build a success response echoing `id`.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response echoing `id`.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RPCError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trip() {
        let raw = r#"{"jsonrpc":"2.0","id":"req-42","method":"tools/call","params":{"name":"ms_beta_lookup","arguments":{"q":"x"}}}"#;
        let request: MCPRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.id, json!("req-42"));
        assert_eq!(request.tool_name(), Some("ms_beta_lookup"));

        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["params"]["arguments"], json!({"q": "x"}));
    }

    #[test]
    fn tool_name_absent_outside_tools_call() {
        let request = MCPRequest::new(1, "tools/list", Some(json!({"name": "x"})));
        assert_eq!(request.tool_name(), None);
    }

    #[test]
    fn null_id_survives_serialization() {
        let response = MCPResponse::error(Value::Null, INTERNAL_ERROR, "boom");
        let encoded = serde_json::to_string(&response).unwrap();
        assert!(encoded.contains(r#""id":null"#));
        assert!(!encoded.contains("result"));
    }

    #[test]
    fn error_response_shape() {
        let response = MCPResponse::error(json!(7), INTERNAL_ERROR, "tool not found: ms_gamma_x");
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["error"]["code"], json!(-32603));
        assert_eq!(encoded["id"], json!(7));
    }
}
