//! Live client settings
//!
//! YAML file plus `.env` overrides. Every field has a default, so an empty
//! file (or no file at all, via [`ClientSettings::load_or_default`]) yields
//! a working configuration pointed at the local development server.

use livesocket::ManagerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Overrides `manager.endpoints.default_url`
pub const SERVER_URL_ENV: &str = "LIVE_SERVER_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Settings for the `live_client` binary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Default tracing filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where the connecting identity is persisted between runs
    #[serde(default = "default_identity_file")]
    pub identity_file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_identity_file() -> String {
    "data/identity.json".to_string()
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            manager: ManagerConfig::default(),
            log_level: default_log_level(),
            identity_file: default_identity_file(),
        }
    }
}

impl ClientSettings {
    /// Load settings from a YAML file and .env
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut settings = Self::from_yaml(&yaml_content)?;

        dotenv::dotenv().ok(); // Don't fail if .env doesn't exist
        settings.apply_overrides(std::env::var(SERVER_URL_ENV).ok());

        settings.validate()?;
        Ok(settings)
    }

    /// Like [`load`](Self::load), but a missing file means defaults
    pub fn load_or_default(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            return Self::load(config_path);
        }

        let mut settings = Self::default();
        dotenv::dotenv().ok();
        settings.apply_overrides(std::env::var(SERVER_URL_ENV).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings without touching the environment
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply environment overrides
    pub fn apply_overrides(&mut self, server_url: Option<String>) {
        if let Some(url) = server_url.filter(|u| !u.trim().is_empty()) {
            self.manager.endpoints.default_url = url.trim().to_string();
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.manager
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.identity_file.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "identity_file must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
