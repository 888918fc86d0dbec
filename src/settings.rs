//! Settings file for live sessions
//!
//! ```yaml
//! endpoint:
//!   url: wss://api.example.com/v1/live
//!   api_key_env: LIVE_ANALYTICS_API_KEY
//!   headers:
//!     X-Client: conversation-analytics
//! session:
//!   encoding: linear16
//!   sample_rate: 16000
//!   channels: 1
//!   speaker_detection: true
//!   min_speakers: 2
//!   max_speakers: 6
//!   action_items: true
//! keep_alive_secs: 8
//! finalize_mode: close
//! close_timeout_secs: 5
//! log_level: info
//! ```

use live_analytics::{ClientConfig, FinalizeMode, SessionConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Overrides `endpoint.url` when set
pub const URL_ENV_VAR: &str = "LIVE_ANALYTICS_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
    /// Name of the environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Live session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub session: SessionConfiguration,
    #[serde(default)]
    pub keep_alive_secs: Option<u64>,
    #[serde(default)]
    pub finalize_mode: FinalizeMode,
    #[serde(default = "default_close_timeout")]
    pub close_timeout_secs: u64,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// API key from the environment (not in YAML)
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_close_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LiveConfig {
    /// Load configuration from YAML file
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: LiveConfig = serde_yaml::from_str(&yaml_content)?;

        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            info!("Overriding endpoint URL from environment variable");
            config.endpoint.url = url;
        }

        if let Some(var) = &config.endpoint.api_key_env {
            let key = std::env::var(var).map_err(|_| ConfigError::EnvVarMissing(var.clone()))?;
            config.api_key = Some(key);
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.session
            .validate()
            .and_then(|()| self.session.connection_url(&self.endpoint.url))
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.keep_alive_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "keep_alive_secs must be greater than 0".to_string(),
            ));
        }

        if self.close_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "close_timeout_secs must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Client options for the live analytics builder
    ///
    /// The API key, if any, becomes an `Authorization: Token <key>` header.
    pub fn client_config(&self) -> ClientConfig {
        let mut headers = self.endpoint.headers.clone();
        if let Some(key) = &self.api_key {
            headers.insert("Authorization".to_string(), format!("Token {}", key));
        }

        ClientConfig {
            url: self.endpoint.url.clone(),
            headers,
            keep_alive_interval: self.keep_alive_secs.map(Duration::from_secs),
            finalize_mode: self.finalize_mode,
        }
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Endpoint: {}", self.endpoint.url);
        info!("  API key: {}", if self.api_key.is_some() { "set" } else { "none" });
        info!("  Keep-alive: {:?} seconds", self.keep_alive_secs);
        info!("  Finalize mode: {:?}", self.finalize_mode);
        info!("  Close timeout: {} seconds", self.close_timeout_secs);
        info!("  Log level: {}", self.log_level);
    }
}
