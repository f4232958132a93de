//! The central Model Context Protocol engine
//!
//! Decodes one JSON-RPC message, negotiates `initialize`, and routes
//! `tools/list` and `tools/call` to the tool registry.

use std::time::Instant;

use rust_mcp_sdk::schema::{
    CallToolRequestParams, CallToolResult, ContentBlock, Implementation, InitializeResult,
    ListToolsResult, ServerCapabilities, ServerCapabilitiesTools, TextContent,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::logging::log_request_summary;
use crate::mcp::registry::ToolRegistry;
use crate::mcp::rpc::{
    is_json_rpc_error, json_rpc_error, json_rpc_notification, json_rpc_result,
    tool_error_to_json_rpc, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};

pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";
pub const SERVER_NAME: &str = "Custom MCP";

/// Handles one raw input line and returns every message to write back, in
/// order. Notifications yield no response; `initialize` yields the response
/// followed by the `initialized` notification.
pub async fn handle_json_rpc_line(registry: &ToolRegistry, line: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(line) {
        Ok(payload) => handle_json_rpc_value(registry, payload).await,
        Err(err) => {
            warn!(error = %err, "json decode error");
            vec![json_rpc_error(None, PARSE_ERROR, "Parse error")]
        }
    }
}

pub async fn handle_json_rpc_value(registry: &ToolRegistry, payload: Value) -> Vec<Value> {
    let Some(object) = payload.as_object() else {
        return vec![json_rpc_error(None, INVALID_REQUEST, "Invalid Request")];
    };

    let request_id = object.get("id").cloned().filter(|id| !id.is_null());

    if let Some(version) = object.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            return vec![json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")];
        }
    }

    let Some(method) = object
        .get("method")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|method| !method.is_empty())
        .map(str::to_string)
    else {
        return vec![json_rpc_error(request_id, INVALID_REQUEST, "Invalid Request")];
    };

    let params = object.get("params").cloned();

    match request_id {
        Some(id) => handle_json_rpc_request(registry, id, method, params).await,
        None => {
            handle_json_rpc_notification(&method);
            Vec::new()
        }
    }
}

pub fn handle_json_rpc_notification(method: &str) {
    match method {
        "initialized" | "notifications/initialized" => {
            info!("received initialized notification");
        }
        "notifications/cancelled" => {
            debug!("ignoring cancellation notification");
        }
        _ => warn!(method = %method, "unknown notification"),
    }
}

pub async fn handle_json_rpc_request(
    registry: &ToolRegistry,
    id: Value,
    method: String,
    params: Option<Value>,
) -> Vec<Value> {
    let started_at = Instant::now();
    let audit_params = redact_audit_params(params.as_ref());
    let id = Some(id);

    let mut messages = Vec::with_capacity(2);
    match method.as_str() {
        "initialize" => {
            let protocol_version = negotiate_protocol_version(params.as_ref());
            messages.push(json_rpc_result(id, initialize_result(protocol_version)));
            messages.push(json_rpc_notification("initialized", None));
            info!(protocol_version, "initialize response sent, server ready");
        }
        "ping" => messages.push(json_rpc_result(id, json!({}))),
        "tools/list" => {
            let result = ListToolsResult {
                meta: None,
                next_cursor: None,
                tools: registry.descriptors(),
            };
            messages.push(match serde_json::to_value(result) {
                Ok(value) => json_rpc_result(id, value),
                Err(err) => {
                    warn!(error = %err, "tools list serialization failed");
                    json_rpc_error(id, INVALID_REQUEST, "Invalid Request")
                }
            });
        }
        "tools/call" => messages.push(handle_tools_call(registry, id, params).await),
        _ => messages.push(json_rpc_error(
            id,
            METHOD_NOT_FOUND,
            &format!("Unknown method: {method}"),
        )),
    }

    let failed = messages.first().is_some_and(is_json_rpc_error);
    info!(
        method = %method,
        params = %audit_params,
        outcome = if failed { "failure" } else { "success" },
        "mcp action audited"
    );
    log_request_summary(&method, failed, started_at);

    messages
}

pub async fn handle_tools_call(
    registry: &ToolRegistry,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    info!(tool = %tool_call.name, "calling tool");
    match registry.call(&tool_call.name, tool_call.arguments).await {
        Ok(result) => json_rpc_result(id, call_tool_result(result)),
        Err(err) => tool_error_to_json_rpc(id, err),
    }
}

/// Wraps a tool's return value in a single text content block.
pub fn call_tool_result(result: Value) -> Value {
    let text = match result {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    };

    let result = CallToolResult {
        content: vec![ContentBlock::from(TextContent::new(text.clone(), None, None))],
        is_error: None,
        meta: None,
        structured_content: None,
    };

    serde_json::to_value(result).unwrap_or_else(|_| {
        json!({
            "content": [{"type": "text", "text": text}]
        })
    })
}

fn initialize_result(protocol_version: &str) -> Value {
    let initialize_result = InitializeResult {
        server_info: Implementation {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: None,
            description: None,
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools {
                list_changed: Some(false),
            }),
            resources: None,
            prompts: None,
            ..Default::default()
        },
        protocol_version: protocol_version.to_string(),
        instructions: None,
        meta: None,
    };

    serde_json::to_value(initialize_result).unwrap_or_else(|_| {
        json!({
            "protocolVersion": protocol_version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")}
        })
    })
}

/// Echoes the client's version when supported, otherwise offers the latest.
pub fn negotiate_protocol_version(params: Option<&Value>) -> &'static str {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim);

    offered_version
        .and_then(|offered| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .copied()
                .find(|supported| *supported == offered)
        })
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(redact_audit_value).unwrap_or(Value::Null)
}

pub fn redact_audit_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String("[REDACTED]".to_string()))
                    } else {
                        (key.clone(), redact_audit_value(item))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_audit_value).collect()),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "authorization" | "bearer" | "api_key" | "apikey" | "code"
    ) || normalized.contains("token")
        || normalized.contains("secret")
        || normalized.contains("password")
        || normalized.contains("credential")
}
