//! Reconcile the two historical reply shapes into one canonical call list.

use super::backend::{RawFunctionCall, RawReply};
use crate::error::GatewayError;
use crate::tools::ToolSchema;
use crate::types::{CanonicalToolCall, NormalizedResponse, ResponseMessage, ToolArgs};
use serde_json::Value;
use tracing::{debug, warn};

/// Build the canonical response for `query`.
///
/// `tool_calls` wins over the legacy `function_call` field when both are
/// present. Calls to offered tools are checked against their schema and
/// mismatches are logged, not rejected.
pub fn normalize(
    query: &str,
    model_id: &str,
    reply: RawReply,
    offered: &[ToolSchema],
) -> Result<NormalizedResponse, GatewayError> {
    let message = reply.message;
    let mut calls = Vec::new();

    match (message.tool_calls, message.function_call) {
        (Some(tool_calls), _) if !tool_calls.is_empty() => {
            for (index, call) in tool_calls.into_iter().enumerate() {
                if let Some(kind) = call.kind.as_deref() {
                    if kind != "function" {
                        debug!("Ignoring tool call of type {}", kind);
                        continue;
                    }
                }
                let id = call.id.unwrap_or_else(|| format!("call_{}", index));
                calls.push(canonical_call(id, call.function)?);
            }
        }
        (_, Some(function_call)) => {
            calls.push(canonical_call("call_0".to_string(), function_call)?);
        }
        _ => {}
    }

    for call in &calls {
        match offered.iter().find(|s| s.name == call.function_name) {
            Some(schema) => {
                for issue in schema.check_arguments(&call.arguments) {
                    warn!("Call {} to {}: {}", call.call_id, call.function_name, issue);
                }
            }
            None => warn!("Model called {} which was not offered", call.function_name),
        }
    }

    Ok(NormalizedResponse {
        query: query.to_string(),
        model_id: model_id.to_string(),
        timestamp: reply
            .created
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        message: ResponseMessage {
            content: message.content,
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
        },
    })
}

fn canonical_call(
    id: String,
    function: RawFunctionCall,
) -> Result<CanonicalToolCall, GatewayError> {
    let arguments = parse_arguments(&function.name, function.arguments)?;
    Ok(CanonicalToolCall::new(id, function.name, arguments))
}

/// Arguments arrive JSON-encoded in a string or as a bare object.
fn parse_arguments(function: &str, raw: Value) -> Result<ToolArgs, GatewayError> {
    let value = match raw {
        Value::Null => return Ok(ToolArgs::new()),
        Value::String(text) if text.trim().is_empty() => return Ok(ToolArgs::new()),
        Value::String(text) => serde_json::from_str(&text).map_err(|e| {
            GatewayError::Protocol(format!("arguments for {} are not valid JSON: {}", function, e))
        })?,
        other => other,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::Protocol(format!(
            "arguments for {} must be an object, got {}",
            function, other
        ))),
    }
}
