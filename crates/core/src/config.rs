use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::paths::Paths;

/// Providers entry holding the Alpha Vantage key used for stock quotes.
pub const ALPHA_VANTAGE_PROVIDER: &str = "alpha_vantage";

/// Database ids still carrying this prefix are setup placeholders, not real ids.
const PLACEHOLDER_ID_PREFIX: &str = "GANTI_DENGAN";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Explicit provider name. Inferred from the model prefix when absent.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "gemini/gemini-2.0-flash".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            provider: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> u32 {
    2
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionConfig {
    #[serde(default = "default_xp_per_message")]
    pub xp_per_message: u32,
    #[serde(default = "default_xp_to_evolve")]
    pub xp_to_evolve: u32,
}

fn default_xp_per_message() -> u32 {
    20
}

fn default_xp_to_evolve() -> u32 {
    100
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            xp_per_message: default_xp_per_message(),
            xp_to_evolve: default_xp_to_evolve(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
    /// Published partner definitions.
    #[serde(default)]
    pub partners_database_id: Option<String>,
    /// Where new partner requests are logged.
    #[serde(default)]
    pub creation_database_id: Option<String>,
    #[serde(default)]
    pub feedback_database_id: Option<String>,
}

fn default_notion_api_base() -> String {
    "https://api.notion.com/v1".to_string()
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: default_notion_api_base(),
            partners_database_id: None,
            creation_database_id: None,
            feedback_database_id: None,
        }
    }
}

impl NotionConfig {
    pub fn is_enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    fn usable_id(id: &Option<String>) -> Option<&str> {
        id.as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && !id.starts_with(PLACEHOLDER_ID_PREFIX))
    }

    pub fn partners_database(&self) -> Option<&str> {
        Self::usable_id(&self.partners_database_id)
    }

    pub fn creation_database(&self) -> Option<&str> {
        Self::usable_id(&self.creation_database_id)
    }

    pub fn feedback_database(&self) -> Option<&str> {
        Self::usable_id(&self.feedback_database_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    18790
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            api_token: None,
            allowed_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("gemini".to_string(), ProviderConfig::default());
        providers.insert("openai".to_string(), ProviderConfig::default());
        providers.insert("openrouter".to_string(), ProviderConfig {
            api_key: String::new(),
            api_base: Some("https://openrouter.ai/api/v1".to_string()),
        });

        Self {
            providers,
            agent: AgentConfig::default(),
            retry: RetryConfig::default(),
            evolution: EvolutionConfig::default(),
            notion: NotionConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, then apply environment overrides.
    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        let mut config = if config_path.exists() {
            Self::load(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Environment values win over the file, matching the usual `.env` deployment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            debug!("Gemini API key taken from environment");
            self.providers.entry("gemini".to_string()).or_default().api_key = key;
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.providers.entry("openai".to_string()).or_default().api_key = key;
        }
        if let Some(key) = non_empty("ALPHA_VANTAGE_API_KEY") {
            self.providers
                .entry(ALPHA_VANTAGE_PROVIDER.to_string())
                .or_default()
                .api_key = key;
        }
        if let Some(key) = non_empty("NOTION_API_KEY") {
            self.notion.api_key = key;
        }
        if let Some(id) = non_empty("NOTION_PARTNERS_DATABASE_ID") {
            self.notion.partners_database_id = Some(id);
        }
        if let Some(id) = non_empty("NOTION_DATABASE_ID") {
            self.notion.creation_database_id = Some(id);
        }
        if let Some(id) = non_empty("NOTION_FEEDBACK_DATABASE_ID") {
            self.notion.feedback_database_id = Some(id);
        }
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// Shared Alpha Vantage key; a partner's own `config.apiKey` takes precedence.
    pub fn market_data_key(&self) -> Option<&str> {
        self.get_provider(ALPHA_VANTAGE_PROVIDER)
            .map(|p| p.api_key.trim())
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.initial_delay_ms, 1000);
        assert_eq!(cfg.retry.backoff_multiplier, 2);
        assert_eq!(cfg.evolution.xp_per_message, 20);
        assert_eq!(cfg.evolution.xp_to_evolve, 100);
        assert!(!cfg.notion.is_enabled());
        assert_eq!(cfg.market_data_key(), None);
    }

    #[test]
    fn test_camel_case_sections() {
        let raw = r#"{
  "agent": { "model": "gpt-4o-mini", "maxTokens": 512 },
  "evolution": { "xpPerMessage": 25 },
  "notion": { "apiKey": "secret", "partnersDatabaseId": "abc" }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.agent.model, "gpt-4o-mini");
        assert_eq!(cfg.agent.max_tokens, 512);
        assert_eq!(cfg.evolution.xp_per_message, 25);
        assert_eq!(cfg.evolution.xp_to_evolve, 100);
        assert_eq!(cfg.notion.partners_database(), Some("abc"));
    }

    #[test]
    fn test_placeholder_database_ids_are_ignored() {
        let mut cfg = Config::default();
        cfg.notion.partners_database_id = Some("GANTI_DENGAN_ID_DATABASE".to_string());
        cfg.notion.feedback_database_id = Some("  ".to_string());
        assert_eq!(cfg.notion.partners_database(), None);
        assert_eq!(cfg.notion.feedback_database(), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|key| match key {
            "GOOGLE_API_KEY" => Some("g-key".to_string()),
            "NOTION_API_KEY" => Some("n-key".to_string()),
            "NOTION_FEEDBACK_DATABASE_ID" => Some("fb".to_string()),
            "ALPHA_VANTAGE_API_KEY" => Some("av-key".to_string()),
            _ => None,
        });
        assert_eq!(cfg.market_data_key(), Some("av-key"));
        assert_eq!(cfg.get_provider("gemini").unwrap().api_key, "g-key");
        assert!(cfg.notion.is_enabled());
        assert_eq!(cfg.notion.feedback_database(), Some("fb"));
        assert_eq!(cfg.notion.partners_database(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut cfg = Config::default();
        cfg.gateway.port = 9000;
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.gateway.port, 9000);
    }
}
