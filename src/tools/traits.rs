//! Tool trait definition and the calling-convention descriptor.

use crate::types::ToolArgs;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Kind of value crossing the tool boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// String-keyed JSON argument map.
    ArgMap,
    Text,
    Number,
    Json,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgMap => write!(f, "map"),
            Self::Text => write!(f, "str"),
            Self::Number => write!(f, "number"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Declared calling convention of a tool implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ValueKind>,
    pub returns: ValueKind,
}

impl Signature {
    /// One argument map in, one string out.
    pub fn standard() -> Self {
        Self {
            params: vec![ValueKind::ArgMap],
            returns: ValueKind::Text,
        }
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::standard()
    }
}

/// A local callable the model can invoke by name.
#[async_trait]
pub trait ToolFunction: Send + Sync {
    /// Implementation name, used when registration does not supply one.
    fn name(&self) -> &str;

    /// Declared calling convention. Checked once at registration.
    fn signature(&self) -> Signature {
        Signature::standard()
    }

    /// Run the tool. Implementations parse their own arguments defensively.
    async fn execute(&self, args: ToolArgs) -> Result<String>;
}

type ToolFn = dyn Fn(ToolArgs) -> Result<String> + Send + Sync;

/// Adapter turning a plain function or closure into a [`ToolFunction`].
///
/// The body runs on tokio's blocking pool, so a caller's timeout can stop
/// waiting on it.
pub struct FnTool {
    name: String,
    signature: Signature,
    func: Arc<ToolFn>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(ToolArgs) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature: Signature::standard(),
            func: Arc::new(func),
        }
    }

    /// Override the declared signature (for wrapped foreign callables).
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }
}

impl fmt::Debug for FnTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

#[async_trait]
impl ToolFunction for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn signature(&self) -> Signature {
        self.signature.clone()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String> {
        let func = Arc::clone(&self.func);
        tokio::task::spawn_blocking(move || (*func)(args))
            .await
            .map_err(|e| anyhow!("tool `{}` did not complete: {}", self.name, e))?
    }
}
