//! Application configuration loader for Inkwell.
//!
//! Reads `config.toml` from the data directory (`~/.inkwell/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed. Provider API keys can also come
//! from the config file; they deserialize into [`ProviderKeys`] and never
//! appear in Debug output.

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;

use inkwell_types::config::ChatConfig;

use crate::llm::factory::ProviderKeys;

/// System prompt prepended to every managed conversation.
const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful writing assistant. Answer concisely and stay on topic.";

/// Top-level service configuration.
#[derive(Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Database URL override. Defaults to `{data_dir}/inkwell.db` when unset.
    pub database_url: Option<String>,
    /// System prompt for managed chat requests.
    pub system_prompt: String,
    /// Chat limits (input, history, concurrency, quota).
    pub chat: ChatConfig,
    /// Service-held provider API keys.
    pub providers: ProviderKeys,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            chat: ChatConfig::default(),
            providers: ProviderKeys::default(),
        }
    }
}

/// Load service configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let mut config = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => match toml::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    "Failed to parse {}: {err}, using defaults",
                    config_path.display()
                );
                AppConfig::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            AppConfig::default()
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            AppConfig::default()
        }
    };
    apply_env_keys(&mut config.providers, |name| std::env::var(name).ok());
    config
}

/// Overlay provider keys from the environment onto `keys`.
///
/// A non-empty `*_API_KEY` variable wins over the config file, so deploys
/// can rotate credentials without touching `config.toml`.
fn apply_env_keys(keys: &mut ProviderKeys, lookup: impl Fn(&str) -> Option<String>) {
    let slots: [(&str, &mut Option<SecretString>); 5] = [
        ("GEMINI_API_KEY", &mut keys.gemini),
        ("DASHSCOPE_API_KEY", &mut keys.dashscope),
        ("DEEPSEEK_API_KEY", &mut keys.deepseek),
        ("MOONSHOT_API_KEY", &mut keys.moonshot),
        ("VOLCENGINE_API_KEY", &mut keys.volcengine),
    ];
    for (name, slot) in slots {
        if let Some(value) = lookup(name) {
            if !value.trim().is_empty() {
                *slot = Some(SecretString::from(value));
            }
        }
    }
}
