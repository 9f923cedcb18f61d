//! Seam between the gateway and whatever answers chat completions.

use crate::error::GatewayError;
use crate::tools::ToolSchema;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Assistant reply exactly as the remote service shaped it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReply {
    /// Unix seconds, when the service reports it.
    #[serde(default)]
    pub created: Option<i64>,
    pub message: RawMessage,
}

/// Both historical tool-call shapes may appear here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<RawToolCall>>,
    #[serde(default)]
    pub function_call: Option<RawFunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub function: RawFunctionCall,
}

/// `arguments` is usually a JSON-encoded string, sometimes an object.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A remote model that accepts a query plus a tool catalog.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Identifier recorded on every normalized response.
    fn model_id(&self) -> &str;

    /// One round trip. Must not retry.
    async fn complete(&self, query: &str, tools: &[ToolSchema]) -> Result<RawReply, GatewayError>;
}
