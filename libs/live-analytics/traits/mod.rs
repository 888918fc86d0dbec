//! # Live Analytics Traits
//!
//! Seams of the live session client:
//!
//! - **Transport**: outbound half of the socket boundary
//! - **MessageCodec**: wire format for control frames and inbound events
//! - **EventListener**: callbacks registered with the event dispatcher
//!
//! ## Example
//!
//! ```rust,ignore
//! use live_analytics::traits::*;
//!
//! struct NullTransport;
//!
//! impl Transport for NullTransport {
//!     fn send(&mut self, _message: WsMessage) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn is_ready(&self) -> bool {
//!         true
//!     }
//!
//!     fn close(&mut self) {}
//! }
//! ```

pub mod codec;
pub mod error;
pub mod listener;
pub mod message;
pub mod transport;

// Re-export commonly used types
pub use codec::MessageCodec;
pub use error::{LiveError, Result};
pub use listener::{ChannelListener, EventListener};
pub use message::WsMessage;
pub use transport::Transport;
