//! Configuration management for Pasteguard.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{GuardError, Result};
use crate::ratelimit::{Action, ActionLimits};

/// Environment variable prefix, e.g. `PASTEGUARD__PASTE__BODY_MAX_LENGTH`.
const ENV_PREFIX: &str = "PASTEGUARD";

/// Main configuration for the Pasteguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Paste lifecycle configuration
    #[serde(default)]
    pub paste: PasteConfig,
}

/// Which storage backend holds pastes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map, lost on restart
    #[default]
    Memory,
    /// SQLite database through sqlx
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database URL for the SQLite backend
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://pasteguard.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    25
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Windows applied to paste creation
    #[serde(default = "default_paste_new_limits")]
    pub paste_new: ActionLimits,

    /// Windows applied to paste reads
    #[serde(default = "default_paste_get_limits")]
    pub paste_get: ActionLimits,

    /// Sweep period override in seconds, capped at the shortest window
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            paste_new: default_paste_new_limits(),
            paste_get: default_paste_get_limits(),
            sweep_interval_secs: None,
        }
    }
}

fn default_paste_new_limits() -> ActionLimits {
    ActionLimits::per_5m_15m_1h(15, 30, 40)
}

fn default_paste_get_limits() -> ActionLimits {
    ActionLimits::per_5m_15m_1h(50, 100, 500)
}

impl RateLimitingConfig {
    /// Windows configured for `action`.
    pub fn limits(&self, action: Action) -> &ActionLimits {
        match action {
            Action::PasteNew => &self.paste_new,
            Action::PasteGet => &self.paste_get,
        }
    }
}

/// Paste creation limits and expiry job settings.
///
/// A limit of 0 disables the corresponding check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteConfig {
    /// Interval of the expired paste cleanup job in seconds
    #[serde(default = "default_cleanup_period")]
    pub cleanup_period_secs: u64,

    /// Maximum title length in characters
    #[serde(default = "default_title_max_length")]
    pub title_max_length: usize,

    /// Maximum body length in characters
    #[serde(default = "default_body_max_length")]
    pub body_max_length: usize,

    /// Maximum paste lifetime in seconds
    #[serde(default)]
    pub max_lifetime_secs: u64,

    /// Accepted syntax names; empty accepts any
    #[serde(default)]
    pub allowed_syntaxes: Vec<String>,
}

impl Default for PasteConfig {
    fn default() -> Self {
        Self {
            cleanup_period_secs: default_cleanup_period(),
            title_max_length: default_title_max_length(),
            body_max_length: default_body_max_length(),
            max_lifetime_secs: 0,
            allowed_syntaxes: Vec::new(),
        }
    }
}

fn default_cleanup_period() -> u64 {
    60
}

fn default_title_max_length() -> usize {
    100
}

fn default_body_max_length() -> usize {
    20000
}

impl ServiceConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GuardError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an optional YAML file overlaid with
    /// `PASTEGUARD__`-prefixed environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path, "Loading configuration");
            builder = builder.add_source(config::File::new(path, config::FileFormat::Yaml));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        for action in Action::ALL {
            self.rate_limiting.limits(action).validate(action)?;
        }
        if self.paste.cleanup_period_secs == 0 {
            return Err(GuardError::Config(
                "paste.cleanup_period_secs must be positive".to_string(),
            ));
        }
        if self.storage.max_connections == 0 {
            return Err(GuardError::Config(
                "storage.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
