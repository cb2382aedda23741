//! JSON-RPC 2.0 subset used by in-process MCP servers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parse error: the message was not valid JSON.
pub const ERROR_PARSE: i64 = -32700;
/// The message was not a valid request object.
pub const ERROR_INVALID_REQUEST: i64 = -32600;
/// Method (or tool) not found.
pub const ERROR_METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const ERROR_INVALID_PARAMS: i64 = -32602;
/// Internal server error.
pub const ERROR_INTERNAL: i64 = -32603;

/// A JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,

    /// Request id; absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,

    /// Method name.
    pub method: String,

    /// Method parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Whether this request is a notification (no id)
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Build a success response
pub fn success_response(id: Option<Value>, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Build an error response
pub fn error_response(id: Option<Value>, code: i64, message: impl Into<String>) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_decodes() {
        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "add", "arguments": {"a": 1}}
        }))
        .unwrap();
        assert_eq!(req.method, "tools/call");
        assert_eq!(req.id, Some(json!(7)));
        assert!(!req.is_notification());
    }

    #[test]
    fn notification_has_no_id() {
        let req: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn response_shapes() {
        let ok = success_response(Some(json!(1)), json!({"tools": []}));
        assert_eq!(ok["jsonrpc"], "2.0");
        assert_eq!(ok["id"], 1);
        assert!(ok.get("error").is_none());

        let err = error_response(Some(json!(2)), ERROR_METHOD_NOT_FOUND, "nope");
        assert_eq!(err["error"]["code"], ERROR_METHOD_NOT_FOUND);
        assert_eq!(err["error"]["message"], "nope");
    }
}
