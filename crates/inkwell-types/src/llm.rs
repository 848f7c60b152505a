//! Model catalog and provider types for Inkwell.
//!
//! The service exposes a fixed catalog of chat models, each routed to one
//! of several OpenAI-compatible upstream providers. Catalog entries also
//! carry per-provider quirk flags (e.g. whether the provider reports token
//! usage on streamed responses).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upstream provider behind a catalog model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Gemini,
    Dashscope,
    Deepseek,
    Moonshot,
    Volcengine,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::Dashscope => write!(f, "dashscope"),
            ProviderKind::Deepseek => write!(f, "deepseek"),
            ProviderKind::Moonshot => write!(f, "moonshot"),
            ProviderKind::Volcengine => write!(f, "volcengine"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "dashscope" => Ok(ProviderKind::Dashscope),
            "deepseek" => Ok(ProviderKind::Deepseek),
            "moonshot" => Ok(ProviderKind::Moonshot),
            "volcengine" => Ok(ProviderKind::Volcengine),
            other => Err(format!("invalid provider kind: '{other}'")),
        }
    }
}

impl ProviderKind {
    /// Whether the provider includes token usage in streamed responses.
    ///
    /// Moonshot rejects requests that ask for stream usage, so the client
    /// must not request it there.
    pub fn stream_usage_supported(&self) -> bool {
        !matches!(self, ProviderKind::Moonshot)
    }
}

/// A model offered by the service, as listed to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Model identifier as sent by clients (e.g. "qwen-plus").
    pub id: String,
    /// Display name for model pickers.
    pub display_name: String,
    /// Upstream provider the model is routed to.
    pub provider: ProviderKind,
}

/// Errors from LLM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("provider error: {message}")]
    Provider { message: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
