use skillai_core::Config;
use std::sync::Arc;
use tracing::info;

use crate::{GeminiProvider, OpenAIProvider, Provider};

/// Default api_base of the OpenAI-compatible providers.
fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        _ => "https://api.openai.com/v1",
    }
}

/// Infer the provider from the model string prefix; `None` when unknown.
pub fn infer_provider_from_model(model: &str) -> Option<&'static str> {
    if model.starts_with("gemini/") || model.starts_with("gemini-") {
        Some("gemini")
    } else if model.starts_with("openai/") || model.starts_with("gpt-") || model.starts_with("o1") || model.starts_with("o3") {
        Some("openai")
    } else if model.starts_with("deepseek") {
        Some("deepseek")
    } else if model.starts_with("groq/") {
        Some("groq")
    } else if model.contains('/') {
        Some("openrouter")
    } else {
        None
    }
}

fn fallback_provider_name(config: &Config) -> Option<&'static str> {
    ["gemini", "openai", "openrouter"].into_iter().find(|name| {
        config
            .get_provider(name)
            .map(|p| !p.api_key.is_empty())
            .unwrap_or(false)
    })
}

/// Build the configured provider.
///
/// Resolution order: `agent.provider`, then the model prefix, then the first
/// provider entry with an API key.
pub fn create_provider(config: &Config) -> anyhow::Result<Arc<dyn Provider>> {
    let model = config.agent.model.as_str();
    let explicit = config.agent.provider.as_deref();

    let provider_name: &str = if let Some(name) = explicit {
        name
    } else if let Some(inferred) = infer_provider_from_model(model) {
        inferred
    } else if let Some(keyed) = fallback_provider_name(config) {
        keyed
    } else {
        return Err(anyhow::anyhow!(
            "No LLM provider configured. Set 'agent.provider', use a recognized model prefix \
             (e.g. 'gemini-2.0-flash', 'gpt-4o'), or add an API key to the providers section."
        ));
    };

    let provider_cfg = config.get_provider(provider_name).ok_or_else(|| {
        anyhow::anyhow!("Provider '{}' not found in providers section", provider_name)
    })?;
    if provider_cfg.api_key.is_empty() {
        return Err(anyhow::anyhow!("Provider '{}' has no API key", provider_name));
    }

    let max_tokens = config.agent.max_tokens;
    let temperature = config.agent.temperature;
    info!(provider = %provider_name, model = %model, "Creating LLM provider");

    let provider: Arc<dyn Provider> = match provider_name {
        "gemini" => Arc::new(GeminiProvider::new(
            &provider_cfg.api_key,
            provider_cfg.api_base.as_deref(),
            model,
            max_tokens,
            temperature,
        )),
        other => Arc::new(OpenAIProvider::new(
            &provider_cfg.api_key,
            Some(
                provider_cfg
                    .api_base
                    .as_deref()
                    .unwrap_or_else(|| default_api_base(other)),
            ),
            model,
            max_tokens,
            temperature,
        )),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_provider_from_model() {
        assert_eq!(infer_provider_from_model("gemini/gemini-2.0-flash"), Some("gemini"));
        assert_eq!(infer_provider_from_model("gemini-1.5-pro"), Some("gemini"));
        assert_eq!(infer_provider_from_model("gpt-4o-mini"), Some("openai"));
        assert_eq!(infer_provider_from_model("meta-llama/llama-3-70b"), Some("openrouter"));
        assert_eq!(infer_provider_from_model("mystery"), None);
    }

    #[test]
    fn test_create_provider_requires_key() {
        let config = Config::default();
        assert!(create_provider(&config).is_err());
    }

    #[test]
    fn test_create_gemini_provider() {
        let mut config = Config::default();
        config.providers.get_mut("gemini").unwrap().api_key = "key".to_string();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_fallback_to_keyed_provider() {
        let mut config = Config::default();
        config.agent.model = "custom-model".to_string();
        config.providers.get_mut("openai").unwrap().api_key = "key".to_string();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }
}
