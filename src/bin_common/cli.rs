//! CLI utilities for binaries
//!
//! Resolves the settings file and parses the small argument surface the
//! binaries share: `[--config PATH] [username]`.

use std::path::PathBuf;
use thiserror::Error;

/// Usage line printed on argument errors
pub const USAGE: &str = "live_client [--config PATH] [username]";

/// Where to find the settings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigType {
    /// config/live_client.yaml, overridable with LIVE_CLIENT_CONFIG_PATH
    LiveClient,
    /// Path given on the command line; used as is
    Custom(String),
}

impl ConfigType {
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::LiveClient => "config/live_client.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Environment variable that may override the path. An explicit path
    /// has none.
    pub fn env_var_name(&self) -> Option<&str> {
        match self {
            ConfigType::LiveClient => Some("LIVE_CLIENT_CONFIG_PATH"),
            ConfigType::Custom(_) => None,
        }
    }
}

/// Resolve the settings path: environment override first, then the default
///
/// # Examples
/// ```
/// use proximatch_client::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Custom("my.yaml".into()));
/// assert_eq!(path.to_str(), Some("my.yaml"));
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    config_type
        .env_var_name()
        .and_then(|name| std::env::var(name).ok())
        .unwrap_or_else(|| config_type.default_path().to_string())
        .into()
}

/// Raw process arguments, program name excluded
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("{0} needs a value")]
    MissingValue(String),

    #[error("unknown option {0}")]
    UnknownFlag(String),

    #[error("unexpected argument {0}")]
    UnexpectedArgument(String),
}

/// Parsed command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// `--config PATH` / `-c PATH` / `--config=PATH`
    pub config: Option<String>,
    /// First positional argument
    pub username: Option<String>,
}

impl CliArgs {
    pub fn parse<I, S>(args: I) -> Result<Self, CliError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            if let Some(path) = arg.strip_prefix("--config=") {
                if path.is_empty() {
                    return Err(CliError::MissingValue("--config".to_string()));
                }
                parsed.config = Some(path.to_string());
            } else if arg == "--config" || arg == "-c" {
                let path = args
                    .next()
                    .filter(|p| !p.starts_with('-'))
                    .ok_or_else(|| CliError::MissingValue(arg.clone()))?;
                parsed.config = Some(path);
            } else if arg.starts_with('-') {
                return Err(CliError::UnknownFlag(arg));
            } else if parsed.username.is_none() {
                parsed.username = Some(arg);
            } else {
                return Err(CliError::UnexpectedArgument(arg));
            }
        }

        Ok(parsed)
    }

    /// Parse the process arguments
    pub fn from_env() -> Result<Self, CliError> {
        Self::parse(parse_args())
    }

    /// `--config` wins over `default`
    pub fn config_type(&self, default: ConfigType) -> ConfigType {
        self.config.clone().map(ConfigType::Custom).unwrap_or(default)
    }

    /// Settings path after applying `--config` and environment overrides
    pub fn config_path(&self, default: ConfigType) -> PathBuf {
        load_config_from_env(self.config_type(default))
    }
}
