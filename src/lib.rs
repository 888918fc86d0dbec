//! Conversation Analytics - Main Library
//!
//! Streams audio to a live conversation-analytics endpoint and surfaces
//! what the server detects (speaker changes, action items, questions,
//! sentiment) as typed events.
//!
//! ## Architecture
//!
//! - **live_analytics**: session engine and WebSocket client (re-exported from workspace)
//! - **settings**: YAML settings with environment overrides
//! - **logging**: tracing subscriber setup
//! - **bin_common**: Common utilities for binary executables
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use conversation_analytics::bin_common::{load_config_from_env, ConfigType};
//! use conversation_analytics::settings::LiveConfig;
//! ```

// Re-export workspace libraries for convenience
pub use live_analytics;

pub mod logging;
pub mod settings;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_config_from_env, parse_args, ConfigType};
}
