//! Configuration loading, validation, and management for FinanBot.
//!
//! Loads configuration from `~/.finanbot/config.toml` with environment
//! variable overrides. Validates all settings at startup; a missing API key
//! is reported by [`AppConfig::require_api_key`] and is fatal for every
//! command that talks to the generation endpoint.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.finanbot/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Upper bound on a whole streamed generation, in seconds
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// BCRP statistics service
    #[serde(default)]
    pub statistics: StatisticsConfig,

    /// Document retrieval
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Content filtering and audit settings
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Identity configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_generation_timeout() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("providers", &self.providers)
            .field("statistics", &self.statistics)
            .field("retrieval", &self.retrieval)
            .field("safety", &self.safety)
            .field("identity", &self.identity)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

/// Settings for the BCRP statistical series API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsConfig {
    /// Set to false to never fetch economic indicators.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_statistics_url")]
    pub base_url: String,

    /// Output format for direct series queries. Indicator lookups always
    /// read JSON.
    #[serde(default = "default_statistics_format")]
    pub format: String,

    /// Applied to every request, indicator lookups included.
    #[serde(default = "default_statistics_language")]
    pub language: String,

    #[serde(default = "default_statistics_timeout")]
    pub timeout_secs: u64,
}

fn default_statistics_url() -> String {
    "https://estadisticas.bcrp.gob.pe/estadisticas/series/api".into()
}
fn default_statistics_format() -> String {
    "json".into()
}
fn default_statistics_language() -> String {
    "esp".into()
}
fn default_statistics_timeout() -> u64 {
    10
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_statistics_url(),
            format: default_statistics_format(),
            language: default_statistics_language(),
            timeout_secs: default_statistics_timeout(),
        }
    }
}

/// Settings for the product-document index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Chunk length in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Passages returned per search
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Embedding model; set to "none" for keyword-only search
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./documentos_financieros")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./finanbot_index.json")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_top_k() -> usize {
    4
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            documents_dir: default_documents_dir(),
            index_path: default_index_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
            embedding_model: default_embedding_model(),
        }
    }
}

/// Replacement keyword/pattern lists for one screening direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Regular expressions, searched against the lowercased text
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Characters of the offending message kept in audit records
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,

    /// Refuse messages that do not look finance-related
    #[serde(default)]
    pub require_financial_topic: bool,

    /// Replaces the built-in input rules when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<RuleSetConfig>,

    /// Replaces the built-in output rules when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<RuleSetConfig>,
}

fn default_excerpt_chars() -> usize {
    100
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            excerpt_chars: default_excerpt_chars(),
            require_financial_topic: false,
            input: None,
            output: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Replace the built-in advisor persona. A `{context}` token is
    /// substituted with the assembled context; otherwise it is appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Sessions idle for longer than this are dropped.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_session_idle_secs() -> u64 {
    1800
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.finanbot/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `FINANBOT_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.api_key.is_none() {
            self.api_key = lookup("FINANBOT_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .filter(|k| !k.trim().is_empty());
        }

        if let Some(provider) = lookup("FINANBOT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("FINANBOT_MODEL") {
            self.default_model = model;
        }

        if let Some(dir) = lookup("FINANBOT_DOCUMENTS_DIR") {
            self.retrieval.documents_dir = PathBuf::from(dir);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".finanbot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generation_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation_timeout_secs must be > 0".into(),
            ));
        }

        if self.gateway.session_idle_secs == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.session_idle_secs must be > 0".into(),
            ));
        }

        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::ValidationError(
                "retrieval.chunk_overlap must be smaller than retrieval.chunk_size".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if self.statistics.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "statistics.base_url must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .and_then(|p| p.api_key.as_ref())
                .is_some()
    }

    /// Fail unless a generation API key is configured.
    pub fn require_api_key(&self) -> Result<(), ConfigError> {
        if self.has_api_key() {
            Ok(())
        } else {
            Err(ConfigError::MissingApiKey)
        }
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            generation_timeout_secs: default_generation_timeout(),
            providers: HashMap::new(),
            statistics: StatisticsConfig::default(),
            retrieval: RetrievalConfig::default(),
            safety: SafetyConfig::default(),
            identity: IdentityConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error(
        "No API key configured. Set OPENAI_API_KEY (or FINANBOT_API_KEY) in the environment or a .env file"
    )]
    MissingApiKey,
}
