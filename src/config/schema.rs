//! Configuration schema for toolgate.toml.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable consulted when `api_key` is empty.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Use the provided tools when they fit the request.";

/// Root configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// OpenAI-compatible API base URL.
    pub api_base_url: String,

    /// API key; falls back to `OPENROUTER_API_KEY`.
    pub api_key: String,

    /// Model used for tool selection.
    pub model: String,

    /// System message sent ahead of every query.
    pub system_prompt: String,

    pub temperature: f64,

    pub max_tokens: u32,

    /// Timeout for one model request, in seconds.
    pub request_timeout_secs: u64,

    /// Shared budget for dispatching one response's tool calls.
    pub chain_timeout_secs: Option<u64>,

    /// Response cache directory. Unset or empty disables caching.
    pub cache_dir: Option<String>,

    /// Where suite reports are written.
    pub results_dir: String,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://openrouter.ai/api/v1".into(),
            api_key: String::new(),
            model: "openai/gpt-3.5-turbo".into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            temperature: 0.1,
            max_tokens: 500,
            request_timeout_secs: 60,
            chain_timeout_secs: None,
            cache_dir: None,
            results_dir: "test_results".into(),
            log_level: "info".into(),
        }
    }
}

impl GatewayConfig {
    /// Resolve a path that may contain `~` to an absolute path.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).into_owned())
    }

    /// Resolved cache directory, if caching is enabled.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .as_deref()
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| self.resolve_path(dir))
    }

    pub fn resolved_results_dir(&self) -> PathBuf {
        self.resolve_path(&self.results_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn chain_timeout(&self) -> Option<Duration> {
        self.chain_timeout_secs.map(Duration::from_secs)
    }

    /// Fill an empty `api_key` from the environment.
    pub fn apply_env(&mut self) {
        if self.api_key.is_empty() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                self.api_key = key;
            }
        }
    }
}
