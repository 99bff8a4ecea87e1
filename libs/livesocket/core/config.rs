use crate::traits::{ExponentialBackoff, LiveSocketError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Logical endpoint selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    /// General channel: presence, alerts, match requests
    #[default]
    Default,
    /// Best-match discovery sub-service
    BestMatch,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Default => write!(f, "default"),
            Variant::BestMatch => write!(f, "bestMatch"),
        }
    }
}

/// Endpoint URLs, one per variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub default_url: String,
    pub best_match_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            default_url: "ws://localhost:8080/ws".to_string(),
            best_match_url: "ws://localhost:8080/ws".to_string(),
        }
    }
}

impl Endpoints {
    /// Same URL for both variants
    pub fn single(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            default_url: url.clone(),
            best_match_url: url,
        }
    }

    pub fn base_url(&self, variant: Variant) -> &str {
        match variant {
            Variant::Default => &self.default_url,
            Variant::BestMatch => &self.best_match_url,
        }
    }

    pub fn set(&mut self, variant: Variant, url: impl Into<String>) {
        match variant {
            Variant::Default => self.default_url = url.into(),
            Variant::BestMatch => self.best_match_url = url.into(),
        }
    }

    /// Full connection URL with the identity as `username` query parameter
    pub fn connection_url(&self, variant: Variant, username: &str) -> String {
        let base = self.base_url(variant);
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}username={}", base, separator, urlencoding::encode(username))
    }
}

/// Automatic reconnection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    pub fn strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            Some(self.max_attempts),
        )
    }
}

/// Identity persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Key under which the identity is persisted
    pub storage_key: String,
    /// Identity used when none is supplied or persisted
    pub anonymous: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            storage_key: "username".to_string(),
            anonymous: "anonymous".to_string(),
        }
    }
}

/// Connection manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Send an online presence envelope right after the connection opens
    #[serde(default = "default_true")]
    pub announce_presence: bool,
    /// Deliver a local `connected` message to message listeners on open
    #[serde(default = "default_true")]
    pub emit_connected_event: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            reconnect: ReconnectConfig::default(),
            identity: IdentityConfig::default(),
            announce_presence: true,
            emit_connected_event: true,
        }
    }
}

impl ManagerConfig {
    pub fn with_endpoints(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            ..Self::default()
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        for url in [&self.endpoints.default_url, &self.endpoints.best_match_url] {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(LiveSocketError::Configuration(format!(
                    "endpoint must use ws:// or wss://, got '{}'",
                    url
                )));
            }
        }

        if self.reconnect.base_delay_ms == 0 {
            return Err(LiveSocketError::Configuration(
                "reconnect.base_delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(LiveSocketError::Configuration(
                "reconnect.max_delay_ms must be >= reconnect.base_delay_ms".to_string(),
            ));
        }

        if self.identity.storage_key.is_empty() {
            return Err(LiveSocketError::Configuration(
                "identity.storage_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
