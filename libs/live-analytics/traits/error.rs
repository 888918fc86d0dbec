use crate::core::connection_state::ConnectionState;
use thiserror::Error;

/// Main error type for live analytics sessions
#[derive(Error, Debug)]
pub enum LiveError {
    /// Session configuration violates an invariant
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Underlying socket failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound frame could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Outbound frame could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Operation not valid in the current state
    #[error("Invalid state transition: {0}")]
    InvalidState(String),

    /// Session reached a terminal state and accepts no further operations
    #[error("Session is {0:?} and no longer accepts operations")]
    SessionClosed(ConnectionState),

    /// Channel send error
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl LiveError {
    /// Shorthand used by validation code
    pub fn configuration(message: impl Into<String>) -> Self {
        LiveError::Configuration(message.into())
    }

    /// Whether this error came from configuration validation
    pub fn is_configuration(&self) -> bool {
        matches!(self, LiveError::Configuration(_))
    }
}

/// Result type for live analytics operations
pub type Result<T> = std::result::Result<T, LiveError>;
