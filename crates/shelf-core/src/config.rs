//! Service configuration
//!
//! Loaded from an optional TOML file, then overridden from the environment:
//! - `SHELF_OPENAI_API_KEY`
//! - `SHELF_OPENAI_BASE_URL`
//! - `SHELF_OPENAI_MODEL`
//! - `SHELF_PROVIDER_TIMEOUT_SECS`
//!
//! Without an API key the text provider is [`ProviderConfig::Unavailable`]
//! and every AI-touching flow answers from its fallback.

use serde::{Deserialize, Serialize};
use shelf_advisor::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use shelf_advisor::{OpenAiConfig, OpenAiProvider, ProviderHandle};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the provider API key
pub const ENV_API_KEY: &str = "SHELF_OPENAI_API_KEY";
/// Environment variable overriding the provider base URL
pub const ENV_BASE_URL: &str = "SHELF_OPENAI_BASE_URL";
/// Environment variable overriding the provider model
pub const ENV_MODEL: &str = "SHELF_OPENAI_MODEL";
/// Environment variable overriding the provider timeout, in seconds
pub const ENV_TIMEOUT_SECS: &str = "SHELF_PROVIDER_TIMEOUT_SECS";

/// Lower bound of the provider timeout, in seconds
pub const MIN_TIMEOUT_SECS: u64 = 1;
/// Upper bound of the provider timeout, in seconds
pub const MAX_TIMEOUT_SECS: u64 = 60;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`ShelfConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Setting has an unusable value
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue {
        /// Setting name
        key: &'static str,
        /// Rejected value
        value: String,
    },

    /// Text provider could not be constructed
    #[error("failed to set up text provider: {0}")]
    Provider(String),
}

/// Result type alias for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Query parameter defaults and bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryDefaults {
    /// Rows returned when no limit is given
    pub default_limit: u64,
    /// Lookback window in days when no period is given
    pub default_period_days: i64,
    /// Largest accepted limit
    pub max_limit: u64,
    /// Longest accepted lookback window, in days
    pub max_period_days: i64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_period_days: 30,
            max_limit: 100,
            max_period_days: 3650,
        }
    }
}

/// Text-provider settings as written in the config file
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// API key; absent means no provider
    pub api_key: Option<String>,
    /// API root
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Deadline per provider call, in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 20,
        }
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Resolved provider choice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// No credentials; fallbacks only
    Unavailable,
    /// OpenAI-compatible endpoint
    OpenAi(OpenAiConfig),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Query defaults
    pub queries: QueryDefaults,
    /// Text provider
    pub provider: ProviderSettings,
}

impl ShelfConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set API key
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.provider.api_key = Some(api_key.into());
        self
    }

    /// Set provider timeout in seconds
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.provider.timeout_secs = secs;
        self
    }

    /// Set query defaults
    #[inline]
    #[must_use]
    pub fn with_queries(mut self, queries: QueryDefaults) -> Self {
        self.queries = queries;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` for invalid TOML or unknown value types
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `Parse` when it is not valid
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// File (if any) overridden by the process environment
    ///
    /// # Errors
    /// File errors, or `InvalidValue` for a malformed environment override
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    /// `InvalidValue` when the timeout override is not a whole number
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(key) = get(ENV_API_KEY) {
            self.provider.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.provider.base_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.provider.model = model;
        }
        if let Some(secs) = get(ENV_TIMEOUT_SECS) {
            self.provider.timeout_secs = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: secs,
            })?;
        }
        Ok(self)
    }

    /// Provider call deadline, clamped to `[1, 60]` seconds
    #[must_use]
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(
            self.provider
                .timeout_secs
                .clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS),
        )
    }

    /// Resolved provider choice
    #[must_use]
    pub fn provider_config(&self) -> ProviderConfig {
        match self.provider.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => ProviderConfig::OpenAi(
                OpenAiConfig::new(key)
                    .with_base_url(self.provider.base_url.clone())
                    .with_model(self.provider.model.clone())
                    .with_request_timeout(self.provider_timeout()),
            ),
            _ => ProviderConfig::Unavailable,
        }
    }

    /// Build the provider handle
    ///
    /// # Errors
    /// `ConfigError::Provider` when the HTTP client cannot be built
    pub fn provider_handle(&self) -> ConfigResult<ProviderHandle> {
        match self.provider_config() {
            ProviderConfig::Unavailable => Ok(ProviderHandle::Unavailable),
            ProviderConfig::OpenAi(config) => OpenAiProvider::new(config)
                .map(ProviderHandle::available)
                .map_err(|e| ConfigError::Provider(e.to_string())),
        }
    }
}
