//! Builds the configured generation provider.

use crate::openai_compat::OpenAiCompatProvider;
use finanbot_config::AppConfig;
use finanbot_core::error::ProviderError;
use finanbot_core::provider::Provider;
use std::sync::Arc;
use tracing::debug;

/// Build the default provider from configuration.
///
/// The key comes from `[providers.<name>]` first, then the root `api_key`.
/// A missing key is not an error here; [`AppConfig::require_api_key`] guards
/// the commands that need one.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let api_key = provider_config
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    debug!(provider = name, base_url = %base_url, "Building provider");
    let provider = OpenAiCompatProvider::new(name, base_url, api_key)?;
    Ok(Arc::new(provider))
}

/// The model to request: the provider's own default, else the global one.
pub fn resolve_model(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}
