//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use proximatch_client::bin_common::{
    load_config_from_env, CliArgs, ClientSettings, ConfigError, ConfigType,
};
use std::env;
use std::io::Write;

#[test]
fn test_live_client_config_default() {
    // Clear env var to test default
    env::remove_var("LIVE_CLIENT_CONFIG_PATH");

    let config_path = load_config_from_env(ConfigType::LiveClient);
    assert_eq!(config_path.to_str().unwrap(), "config/live_client.yaml");
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_config_type_env_var_names() {
    assert_eq!(ConfigType::LiveClient.env_var_name(), Some("LIVE_CLIENT_CONFIG_PATH"));
    assert_eq!(ConfigType::Custom("x.yaml".to_string()).env_var_name(), None);
}

#[test]
fn test_config_flag_loads_the_given_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "log_level: debug").unwrap();
    let path = file.path().to_str().unwrap().to_string();

    let args = CliArgs::parse(["--config".to_string(), path.clone(), "alice".to_string()]).unwrap();
    let config_path = args.config_path(ConfigType::LiveClient);
    assert_eq!(config_path.to_str(), Some(path.as_str()));

    let settings = ClientSettings::load(&config_path).unwrap();
    assert_eq!(settings.log_level, "debug");
    assert_eq!(args.username.as_deref(), Some("alice"));
}

#[test]
fn test_shipped_config_parses() {
    let yaml = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/config/live_client.yaml"
    ))
    .unwrap();

    let settings = ClientSettings::from_yaml(&yaml).unwrap();
    assert!(settings.validate().is_ok());
    assert_eq!(settings.manager.reconnect.base_delay_ms, 1000);
    assert_eq!(settings.manager.reconnect.max_delay_ms, 30000);
    assert_eq!(settings.manager.reconnect.max_attempts, 5);
    assert_eq!(settings.manager.identity.storage_key, "username");
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "log_level: warn\nidentity_file: /tmp/id.json\nmanager:\n  endpoints:\n    best_match_url: wss://match.example.com/ws"
    )
    .unwrap();

    let settings = ClientSettings::from_yaml(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
    assert_eq!(settings.log_level, "warn");
    assert_eq!(settings.identity_file, "/tmp/id.json");
    assert_eq!(
        settings.manager.endpoints.best_match_url,
        "wss://match.example.com/ws"
    );
    assert_eq!(settings.manager.endpoints.default_url, "ws://localhost:8080/ws");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ClientSettings::load(dir.path().join("missing.yaml"));
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let result = ClientSettings::from_yaml("manager: [1, 2");
    assert!(matches!(result, Err(ConfigError::YamlError(_))));
}

#[test]
fn test_invalid_reconnect_settings_rejected() {
    let mut settings =
        ClientSettings::from_yaml("manager:\n  reconnect:\n    base_delay_ms: 0").unwrap();
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::ValidationError(_))
    ));

    settings.manager.reconnect.base_delay_ms = 5000;
    settings.manager.reconnect.max_delay_ms = 1000;
    assert!(settings.validate().is_err());
}
