//! Session engine and its WebSocket client
//!
//! ```text
//!   LiveClientBuilder ──connect()──> LiveClient ── I/O task (tokio-tungstenite)
//!                                        │                  │
//!                                        ▼                  ▼
//!                                   LiveSession <── handle_open/message/error/close
//!                                        │
//!                         SendBuffer · JsonCodec · EventDispatcher
//! ```

pub mod buffer;
pub mod builder;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection_state;
pub mod dispatcher;
pub mod events;
pub mod heartbeat;
pub mod session;

// Re-export main types
pub use buffer::{PendingSend, SendBuffer};
pub use builder::{states, LiveClientBuilder};
pub use client::LiveClient;
pub use codec::{ControlFrame, JsonCodec};
pub use config::{ClientConfig, FinalizeMode, SessionConfiguration};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
pub use dispatcher::{EventDispatcher, ListenerId};
pub use events::{ErrorEvent, ErrorKind, EventKind, SessionEvent};
pub use session::LiveSession;

/// Create a new live client builder
///
/// # Example
/// ```ignore
/// let client = live_analytics::builder()
///     .url("wss://api.example.com/v1/live")
///     .config(SessionConfiguration::new().with_speakers(2, 4))
///     .on(EventKind::SpeakerChange, |event: &SessionEvent| println!("{:?}", event.data()))
///     .keep_alive(Duration::from_secs(8))
///     .connect()
///     .await?;
/// ```
pub fn builder() -> LiveClientBuilder<builder::states::NoUrl> {
    LiveClientBuilder::new()
}
