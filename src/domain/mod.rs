//! Tool surface exposed over the Model Context Protocol
//!
//! Each submodule declares its argument structs with `mcp_tool`, shapes
//! upstream responses into tool payloads, and registers its handlers. Upstream
//! failures never leave a handler as an error: they become `{"error": …}`
//! payloads so the caller sees them as ordinary tool output.

pub mod analytics;
pub mod calculator;
pub mod channel;
pub mod content;
pub mod github;
pub mod semantic;
pub mod slack;
pub mod strategy;
pub mod utils;
pub mod youtube;

use serde_json::Value;
use tracing::warn;

use crate::errors::ApiError;

pub(crate) fn into_payload(result: Result<Value, ApiError>) -> Value {
    result.unwrap_or_else(|err| {
        warn!(error = %err, local = err.is_local(), "tool call failed");
        err.to_payload()
    })
}

pub(crate) fn into_list_payload(result: Result<Value, ApiError>) -> Value {
    result.unwrap_or_else(|err| {
        warn!(error = %err, local = err.is_local(), "tool call failed");
        err.to_list_payload()
    })
}
