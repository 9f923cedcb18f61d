//! Error taxonomy for registration, lookup, execution and remote calls.

use thiserror::Error;

/// A tool schema does not follow the calling convention.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema for `{tool}` is missing required field `{field}`")]
    MissingField { tool: String, field: &'static str },

    #[error("schema name `{found}` does not match tool name `{expected}`")]
    NameMismatch { expected: String, found: String },

    #[error("`parameters` of `{tool}` must be an object with type=\"object\"")]
    ParametersNotObject { tool: String },

    #[error("`parameters` of `{tool}` must contain `{field}`")]
    MissingParametersField { tool: String, field: &'static str },

    #[error("property `{property}` must contain `{field}`")]
    PropertyMissingField { property: String, field: &'static str },

    #[error("`enum` of property `{property}` must be a list")]
    EnumNotList { property: String },

    #[error("keyword `{keyword}` in property `{property}` is not supported")]
    UnsupportedKeyword { property: String, keyword: String },

    #[error("property `{property}` has unsupported type `{kind}`")]
    UnsupportedType { property: String, kind: String },

    #[error("required parameter `{name}` is not declared in properties")]
    UnknownRequired { name: String },

    #[error("malformed schema for `{tool}`: {reason}")]
    Malformed { tool: String, reason: String },
}

/// A tool implementation declares a calling convention other than
/// "one argument map in, one string out".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("tool `{tool}` must accept exactly 1 argument, got {arity}")]
    Arity { tool: String, arity: usize },

    #[error("tool `{tool}` must accept an argument map")]
    ArgumentNotMap { tool: String },

    #[error("tool `{tool}` must return a string")]
    ReturnNotText { tool: String },
}

/// Errors surfaced by the function registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("function `{name}` is not registered")]
    NotFound { name: String },

    #[error("function `{name}` failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A shared deadline budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("time budget of {budget_ms} ms exhausted")]
pub struct TimeoutError {
    pub budget_ms: u128,
}

/// Failure talking to the remote model. Never escapes `ModelGateway::call`;
/// it is folded into a `FailedResponse`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to model failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("request to model timed out")]
    Timeout,

    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected model reply: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

impl From<TimeoutError> for GatewayError {
    fn from(_: TimeoutError) -> Self {
        Self::Timeout
    }
}
