//! Model catalog and backend resolution.
//!
//! [`CatalogBackendFactory`] maps the model ids the service offers to
//! provider backends. Managed models use service-held API keys; BYO
//! requests carry the caller's own key and an optional base URL override.

use secrecy::SecretString;
use serde::Deserialize;

use inkwell_core::llm::{BoxChatBackend, ChatBackendFactory};
use inkwell_types::chat::ByoAccount;
use inkwell_types::error::ChatError;
use inkwell_types::llm::{ModelEntry, ProviderKind};

use super::openai_compat::config::{OpenAiCompatConfig, default_base_url, profile};
use super::openai_compat::OpenAiCompatBackend;

/// Service-held API keys, one per upstream provider.
///
/// A missing key leaves the provider's catalog entries listed but
/// unusable until the operator configures it.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderKeys {
    pub gemini: Option<SecretString>,
    pub dashscope: Option<SecretString>,
    pub deepseek: Option<SecretString>,
    pub moonshot: Option<SecretString>,
    pub volcengine: Option<SecretString>,
}

impl ProviderKeys {
    fn key_for(&self, kind: ProviderKind) -> Option<&SecretString> {
        match kind {
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::Dashscope => self.dashscope.as_ref(),
            ProviderKind::Deepseek => self.deepseek.as_ref(),
            ProviderKind::Moonshot => self.moonshot.as_ref(),
            ProviderKind::Volcengine => self.volcengine.as_ref(),
        }
    }
}

/// The models the service offers.
fn default_catalog() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            id: "gemini-2.5-flash".to_string(),
            display_name: "Gemini 2.5 Flash".to_string(),
            provider: ProviderKind::Gemini,
        },
        ModelEntry {
            id: "qwen-plus".to_string(),
            display_name: "Qwen Plus".to_string(),
            provider: ProviderKind::Dashscope,
        },
        ModelEntry {
            id: "qwen-turbo".to_string(),
            display_name: "Qwen Turbo".to_string(),
            provider: ProviderKind::Dashscope,
        },
        ModelEntry {
            id: "deepseek-chat".to_string(),
            display_name: "DeepSeek Chat".to_string(),
            provider: ProviderKind::Deepseek,
        },
        ModelEntry {
            id: "kimi-k2-0711-preview".to_string(),
            display_name: "Kimi K2".to_string(),
            provider: ProviderKind::Moonshot,
        },
        ModelEntry {
            id: "doubao-seed-1-6-250615".to_string(),
            display_name: "Doubao Seed 1.6".to_string(),
            provider: ProviderKind::Volcengine,
        },
    ]
}

/// Backend factory backed by a fixed model catalog.
pub struct CatalogBackendFactory {
    keys: ProviderKeys,
    catalog: Vec<ModelEntry>,
}

impl CatalogBackendFactory {
    /// Create a factory with the default catalog and the given keys.
    pub fn new(keys: ProviderKeys) -> Self {
        Self {
            keys,
            catalog: default_catalog(),
        }
    }

    fn entry_for(&self, model: &str) -> Result<&ModelEntry, ChatError> {
        self.catalog
            .iter()
            .find(|e| e.id == model)
            .ok_or_else(|| ChatError::UnsupportedModel(model.to_string()))
    }
}

impl ChatBackendFactory for CatalogBackendFactory {
    fn models(&self) -> Vec<ModelEntry> {
        self.catalog.clone()
    }

    fn backend_for(&self, model: &str) -> Result<BoxChatBackend, ChatError> {
        let entry = self.entry_for(model)?;
        let key = self.keys.key_for(entry.provider).ok_or_else(|| {
            ChatError::UpstreamProvider(format!(
                "no API key configured for provider {}",
                entry.provider
            ))
        })?;

        let backend = OpenAiCompatBackend::new(profile(entry.provider, key.clone(), model));
        Ok(BoxChatBackend::new(backend))
    }

    fn byo_backend(&self, model: &str, account: &ByoAccount) -> Result<BoxChatBackend, ChatError> {
        let entry = self.entry_for(model)?;

        let api_key = account.api_key.trim();
        if api_key.is_empty() {
            return Err(ChatError::Validation("api key must not be empty".to_string()));
        }

        let base_url = match account.base_url.as_deref() {
            Some(raw) => validate_base_url(raw)?,
            None => default_base_url(entry.provider).to_string(),
        };

        let backend = OpenAiCompatBackend::new(OpenAiCompatConfig {
            name: format!("byo:{}/{model}", entry.provider),
            base_url,
            api_key: SecretString::from(api_key),
            model: model.to_string(),
            include_stream_usage: entry.provider.stream_usage_supported(),
        });
        Ok(BoxChatBackend::new(backend))
    }
}

/// Normalize and sanity-check a caller-supplied base URL.
///
/// Catches the common mistakes: pasting the API key into the URL field,
/// including the `/chat/completions` path (the client appends it), or
/// omitting the scheme.
fn validate_base_url(raw: &str) -> Result<String, ChatError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ChatError::Validation("base url must not be empty".to_string()));
    }
    if trimmed.starts_with("sk-") {
        return Err(ChatError::Validation(
            "base url looks like an API key".to_string(),
        ));
    }
    if trimmed.contains("/chat/completions") {
        return Err(ChatError::Validation(
            "base url must not include the /chat/completions path".to_string(),
        ));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = reqwest::Url::parse(&with_scheme)
        .map_err(|e| ChatError::Validation(format!("invalid base url: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ChatError::Validation(format!(
            "unsupported base url scheme: {}",
            url.scheme()
        )));
    }

    Ok(with_scheme.trim_end_matches('/').to_string())
}
