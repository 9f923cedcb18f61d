//! OpenAI-compatible chat completions backend (OpenRouter by default).

use super::backend::{ModelBackend, RawMessage, RawReply};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::tools::ToolSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: String,
    temperature: f64,
    max_tokens: u32,
    http: reqwest::Client,
}

// -- OpenAI-compatible request/response types --------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<MessagePayload<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolPayload<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct MessagePayload<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolPayload<'a> {
    r#type: &'a str,
    function: &'a ToolSchema,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: RawMessage,
}

impl OpenAiBackend {
    /// Create a backend with an explicit per-request timeout.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            system_prompt: crate::config::schema::DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.1,
            max_tokens: 500,
            http,
        })
    }

    /// Backend configured from `toolgate.toml`.
    pub fn from_config(config: &GatewayConfig, api_key: &str) -> Result<Self, GatewayError> {
        Ok(Self::new(
            &config.api_base_url,
            api_key,
            &config.model,
            config.request_timeout(),
        )?
        .with_system_prompt(&config.system_prompt)
        .with_sampling(config.temperature, config.max_tokens))
    }

    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, query: &str, tools: &[ToolSchema]) -> Result<RawReply, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);

        let tool_payloads: Option<Vec<ToolPayload>> = if tools.is_empty() {
            None
        } else {
            Some(
                tools
                    .iter()
                    .map(|t| ToolPayload {
                        r#type: "function",
                        function: t,
                    })
                    .collect(),
            )
        };

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                MessagePayload {
                    role: "system",
                    content: &self.system_prompt,
                },
                MessagePayload {
                    role: "user",
                    content: query,
                },
            ],
            tool_choice: tool_payloads.as_ref().map(|_| "auto"),
            tools: tool_payloads,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!("Chat completion request to model: {}", self.model);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatResponse = resp.json().await?;
        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Protocol("reply contains no choices".into()))?;

        Ok(RawReply {
            created: body.created,
            message: choice.message,
        })
    }
}
