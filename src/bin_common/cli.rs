//! CLI utilities for binaries
//!
//! Handles configuration loading and environment variables
//! for all binary executables.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Live session configuration (config/live_config.yaml)
    Live,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Live => "config/live_config.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Environment variable that overrides the default path
    ///
    /// An explicit custom path has no override.
    pub fn env_var_name(&self) -> Option<&'static str> {
        match self {
            ConfigType::Live => Some("LIVE_CONFIG_PATH"),
            ConfigType::Custom(_) => None,
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use conversation_analytics::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Live);
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    config_type
        .env_var_name()
        .and_then(|name| std::env::var(name).ok())
        .unwrap_or_else(|| config_type.default_path().to_string())
        .into()
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
