//! Shared types used across the gateway, dispatcher and suite runner.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Argument map handed to every tool implementation.
pub type ToolArgs = Map<String, Value>;

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// Provider-agnostic "invoke tool X with arguments Y" request.
///
/// Serialized in the cache record shape:
/// `{id, type: "function", function: {name, arguments}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireToolCall", into = "WireToolCall")]
pub struct CanonicalToolCall {
    pub call_id: String,
    pub function_name: String,
    pub arguments: ToolArgs,
}

impl CanonicalToolCall {
    pub fn new(
        call_id: impl Into<String>,
        function_name: impl Into<String>,
        arguments: ToolArgs,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            function_name: function_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: ToolArgs,
}

fn function_kind() -> String {
    "function".into()
}

impl From<WireToolCall> for CanonicalToolCall {
    fn from(wire: WireToolCall) -> Self {
        Self {
            call_id: wire.id,
            function_name: wire.function.name,
            arguments: wire.function.arguments,
        }
    }
}

impl From<CanonicalToolCall> for WireToolCall {
    fn from(call: CanonicalToolCall) -> Self {
        Self {
            id: call.call_id,
            kind: function_kind(),
            function: WireFunction {
                name: call.function_name,
                arguments: call.arguments,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Model responses
// ---------------------------------------------------------------------------

/// Assistant message after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    /// `None` when the model made no tool call.
    pub tool_calls: Option<Vec<CanonicalToolCall>>,
}

/// A successful, normalized model reply. This is also the cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResponse {
    #[serde(rename = "user_query")]
    pub query: String,
    #[serde(rename = "model")]
    pub model_id: String,
    pub timestamp: i64,
    pub message: ResponseMessage,
}

impl NormalizedResponse {
    /// Tool calls in the order the model issued them.
    pub fn tool_calls(&self) -> &[CanonicalToolCall] {
        self.message.tool_calls.as_deref().unwrap_or(&[])
    }

    pub fn content(&self) -> Option<&str> {
        self.message.content.as_deref()
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}

/// Category of a contained remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    Timeout,
    Status,
    Protocol,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Timeout => write!(f, "timeout"),
            Self::Status => write!(f, "status"),
            Self::Protocol => write!(f, "protocol"),
        }
    }
}

/// Error-shaped response returned instead of raising a remote failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedResponse {
    pub user_query: String,
    pub error: String,
    pub kind: FailureKind,
    /// Names of the functions that were offered to the model.
    pub functions_called: Vec<String>,
}

/// Outcome of one `ModelGateway::call`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GatewayResponse {
    Completed(NormalizedResponse),
    Failed(FailedResponse),
}

impl GatewayResponse {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn completed(&self) -> Option<&NormalizedResponse> {
        match self {
            Self::Completed(resp) => Some(resp),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailedResponse> {
        match self {
            Self::Completed(_) => None,
            Self::Failed(fail) => Some(fail),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution chain
// ---------------------------------------------------------------------------

/// Result or error message of a single dispatched call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Result(String),
    Error(String),
}

/// One entry of an execution chain: `{function, result}` or `{function, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    #[serde(rename = "function")]
    pub function_name: String,
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
}

impl ExecutionRecord {
    pub fn success(function_name: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            outcome: ExecutionOutcome::Result(result.into()),
        }
    }

    pub fn failure(function_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            function_name: function_name.into(),
            outcome: ExecutionOutcome::Error(error.into()),
        }
    }

    pub fn result(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Result(r) => Some(r),
            ExecutionOutcome::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExecutionOutcome::Result(_) => None,
            ExecutionOutcome::Error(e) => Some(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Result(_))
    }
}

/// Ordered per-call outcomes for one model response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionChain(Vec<ExecutionRecord>);

impl ExecutionChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ExecutionRecord) {
        self.0.push(record);
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&ExecutionRecord> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Target function names in call order.
    pub fn function_names(&self) -> Vec<&str> {
        self.0.iter().map(|r| r.function_name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExecutionRecord> {
        self.0.iter()
    }
}

impl From<Vec<ExecutionRecord>> for ExecutionChain {
    fn from(records: Vec<ExecutionRecord>) -> Self {
        Self(records)
    }
}

impl<'a> IntoIterator for &'a ExecutionChain {
    type Item = &'a ExecutionRecord;
    type IntoIter = std::slice::Iter<'a, ExecutionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_serializes_in_wire_shape() {
        let mut args = ToolArgs::new();
        args.insert("num".into(), json!(16));
        let call = CanonicalToolCall::new("call_1", "sqrt_num", args);

        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "call_1",
                "type": "function",
                "function": {"name": "sqrt_num", "arguments": {"num": 16}}
            })
        );
    }

    #[test]
    fn execution_record_shapes() {
        let ok = serde_json::to_value(ExecutionRecord::success("add_num", "5")).unwrap();
        assert_eq!(ok, json!({"function": "add_num", "result": "5"}));

        let err = serde_json::to_value(ExecutionRecord::failure("nope", "not found")).unwrap();
        assert_eq!(err, json!({"function": "nope", "error": "not found"}));
    }

    #[test]
    fn gateway_response_untagged_parse() {
        let failed: GatewayResponse = serde_json::from_value(json!({
            "user_query": "q",
            "error": "boom",
            "kind": "transport",
            "functions_called": ["add_num"]
        }))
        .unwrap();
        assert!(failed.is_failed());

        let done: GatewayResponse = serde_json::from_value(json!({
            "user_query": "q",
            "model": "m",
            "timestamp": 1,
            "message": {"content": "hi", "tool_calls": null}
        }))
        .unwrap();
        let resp = done.completed().unwrap();
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.content(), Some("hi"));
    }
}
