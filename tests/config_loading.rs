//! Integration test: Configuration utilities
//!
//! Tests settings loading and the bin_common configuration helpers.

use conversation_analytics::bin_common::{load_config_from_env, ConfigType};
use conversation_analytics::live_analytics::FinalizeMode;
use conversation_analytics::settings::{ConfigError, LiveConfig, URL_ENV_VAR};
use std::env;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

const MINIMAL: &str = r#"
endpoint:
  url: wss://api.example.com/v1/live
"#;

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    assert_eq!(custom.default_path(), "custom/path.yaml");
    assert_eq!(custom.env_var_name(), None);
}

// Only test touching LIVE_CONFIG_PATH, so parallel tests cannot race on it
#[test]
fn test_config_path_resolution() {
    env::remove_var("LIVE_CONFIG_PATH");
    let config_path = load_config_from_env(ConfigType::Live);
    assert_eq!(config_path.to_str().unwrap(), "config/live_config.yaml");

    env::set_var("LIVE_CONFIG_PATH", "from/env.yaml");
    let custom = load_config_from_env(ConfigType::Custom("custom/path.yaml".to_string()));
    let live = load_config_from_env(ConfigType::Live);
    env::remove_var("LIVE_CONFIG_PATH");

    assert_eq!(custom.to_str().unwrap(), "custom/path.yaml");
    assert_eq!(live.to_str().unwrap(), "from/env.yaml");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let file = write_config(MINIMAL);
    let config = LiveConfig::load(file.path()).unwrap();

    assert!(config.session.is_empty());
    assert_eq!(config.keep_alive_secs, None);
    assert_eq!(config.finalize_mode, FinalizeMode::Close);
    assert_eq!(config.close_timeout(), Duration::from_secs(5));
    assert_eq!(config.log_level, "info");
    assert!(config.api_key.is_none());
}

#[test]
fn test_full_config() {
    let file = write_config(
        r#"
endpoint:
  url: wss://api.example.com/v1/live
  headers:
    X-Client: tests
session:
  sample_rate: 16000
  min_speakers: 2
  max_speakers: 4
  sentiment: true
keep_alive_secs: 8
finalize_mode: signal_only
close_timeout_secs: 3
log_level: debug
"#,
    );
    let config = LiveConfig::load(file.path()).unwrap();

    assert_eq!(config.session.sample_rate, Some(16000));
    assert_eq!(config.session.max_speakers, Some(4));
    assert_eq!(config.session.sentiment, Some(true));
    assert_eq!(config.finalize_mode, FinalizeMode::SignalOnly);

    let client = config.client_config();
    assert_eq!(client.keep_alive_interval, Some(Duration::from_secs(8)));
    assert_eq!(client.finalize_mode, FinalizeMode::SignalOnly);
    assert_eq!(client.headers.get("X-Client").map(String::as_str), Some("tests"));
}

#[test]
fn test_invalid_session_options_rejected() {
    let file = write_config(
        r#"
endpoint:
  url: wss://api.example.com/v1/live
session:
  min_speakers: 5
  max_speakers: 3
"#,
    );
    let err = LiveConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)), "{}", err);
}

#[test]
fn test_invalid_log_level_rejected() {
    let file = write_config(&format!("{}log_level: loud\n", MINIMAL));
    let err = LiveConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_zero_keep_alive_rejected() {
    let file = write_config(&format!("{}keep_alive_secs: 0\n", MINIMAL));
    assert!(matches!(
        LiveConfig::load(file.path()),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_malformed_yaml() {
    let file = write_config("endpoint: [unclosed");
    assert!(matches!(LiveConfig::load(file.path()), Err(ConfigError::YamlError(_))));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        LiveConfig::load("does/not/exist.yaml"),
        Err(ConfigError::FileError(_))
    ));
}

#[test]
fn test_api_key_from_environment() {
    env::set_var("CA_TEST_API_KEY_PRESENT", "secret-key");
    let file = write_config(
        r#"
endpoint:
  url: wss://api.example.com/v1/live
  api_key_env: CA_TEST_API_KEY_PRESENT
"#,
    );
    let config = LiveConfig::load(file.path()).unwrap();

    assert_eq!(config.api_key.as_deref(), Some("secret-key"));
    assert_eq!(
        config.client_config().headers.get("Authorization").map(String::as_str),
        Some("Token secret-key")
    );
}

#[test]
fn test_missing_api_key_variable() {
    env::remove_var("CA_TEST_API_KEY_MISSING");
    let file = write_config(
        r#"
endpoint:
  url: wss://api.example.com/v1/live
  api_key_env: CA_TEST_API_KEY_MISSING
"#,
    );
    match LiveConfig::load(file.path()) {
        Err(ConfigError::EnvVarMissing(name)) => assert_eq!(name, "CA_TEST_API_KEY_MISSING"),
        other => panic!("expected EnvVarMissing, got {:?}", other),
    }
}

#[test]
fn test_url_override_from_environment() {
    let file = write_config(
        r#"
endpoint:
  url: https://not-a-websocket.example.com
"#,
    );

    env::set_var(URL_ENV_VAR, "ws://127.0.0.1:9000/v1/live");
    let result = LiveConfig::load(file.path());
    env::remove_var(URL_ENV_VAR);

    let config = result.unwrap();
    assert_eq!(config.endpoint.url, "ws://127.0.0.1:9000/v1/live");
}

#[test]
fn test_shipped_config_is_valid() {
    let yaml = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/live_config.yaml")).unwrap();
    let config: LiveConfig = serde_yaml::from_str(&yaml).unwrap();
    config.validate().unwrap();
    assert_eq!(config.keep_alive_secs, Some(8));
}
