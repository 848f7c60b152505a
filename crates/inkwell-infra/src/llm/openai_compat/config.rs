//! Configuration and per-provider defaults for OpenAI-compatible backends.
//!
//! Every upstream the service routes to (Gemini, Dashscope, DeepSeek,
//! Moonshot, Volcengine) speaks the OpenAI chat completions protocol, so
//! one backend covers them all via configurable base URLs. Provider
//! quirks (Moonshot rejects `stream_options.include_usage`) are carried
//! as flags here.

use secrecy::SecretString;

use inkwell_types::llm::ProviderKind;

/// Configuration for an OpenAI-compatible chat backend.
///
/// Used to construct an [`super::OpenAiCompatBackend`].
pub struct OpenAiCompatConfig {
    /// Human-readable backend name (e.g., "dashscope/qwen-plus").
    pub name: String,
    /// Base URL for the API (e.g., "https://api.deepseek.com/v1").
    pub base_url: String,
    /// API key for authentication.
    pub api_key: SecretString,
    /// Model identifier sent upstream.
    pub model: String,
    /// Whether to request token usage on streamed responses.
    pub include_stream_usage: bool,
}

/// Default OpenAI-compatible base URL for a provider.
pub fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        ProviderKind::Dashscope => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        ProviderKind::Deepseek => "https://api.deepseek.com/v1",
        ProviderKind::Moonshot => "https://api.moonshot.cn/v1",
        ProviderKind::Volcengine => "https://ark.cn-beijing.volces.com/api/v3",
    }
}

/// Build the configuration for a catalog model routed to `kind`.
pub fn profile(kind: ProviderKind, api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        name: format!("{kind}/{model}"),
        base_url: default_base_url(kind).to_string(),
        api_key,
        model: model.to_string(),
        include_stream_usage: kind.stream_usage_supported(),
    }
}
