//! JSON-RPC protocol representations and formatting utilities
//!
//! Provides standardized mapping of dispatch errors to valid JSON-RPC payloads.

use rust_mcp_sdk::schema::{JsonrpcResultResponse, RequestId, Result as McpResult};
use serde_json::{json, Value};

use crate::errors::ToolError;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn tool_error_to_json_rpc(id: Option<Value>, err: ToolError) -> Value {
    match err {
        ToolError::UnknownTool { ref name } => json_rpc_error_with_data(
            id,
            METHOD_NOT_FOUND,
            &err.to_string(),
            Some(json!({
                "code": "tool_not_found",
                "message": "unknown tool name",
                "details": {
                    "name": name,
                },
            })),
        ),
        ToolError::InvalidArguments { .. } => {
            json_rpc_error(id, INVALID_PARAMS, &err.to_string())
        }
    }
}

pub fn json_rpc_error(id: Option<Value>, code: i64, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

/// Error envelope. The id is always present, `null` when it is unknown.
pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i64,
    message: &str,
    data: Option<Value>,
) -> Value {
    let mut error = json!({
        "code": code,
        "message": message,
    });
    if let Some(data) = data {
        error["data"] = data;
    }

    json!({
        "jsonrpc": "2.0",
        "id": id.unwrap_or(Value::Null),
        "error": error
    })
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        if let Some(extra) = result.as_object().cloned() {
            let response =
                JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra: Some(extra) });
            if let Ok(value) = serde_json::to_value(response) {
                return value;
            }
        }
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn json_rpc_notification(method: &str, params: Option<Value>) -> Value {
    let mut notification = json!({
        "jsonrpc": "2.0",
        "method": method,
    });
    if let Some(params) = params {
        notification["params"] = params;
    }
    notification
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}
