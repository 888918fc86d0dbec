//! # Live Analytics
//!
//! Streaming client for live conversation analytics: audio goes up a
//! WebSocket, speaker changes, action items, questions, sentiment and the
//! rest come back as typed events.
//!
//! ## Features
//!
//! - **Explicit lifecycle**: `Idle → Connecting → Open → Closing → Closed`, or `Failed`
//! - **No lost sends**: audio sent before the socket opens is buffered and flushed in order
//! - **Typed events**: one listener registry keyed by [`EventKind`]
//! - **Pluggable transport**: the session only needs a [`Transport`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use live_analytics::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = live_analytics::builder()
//!         .url("wss://api.example.com/v1/live")
//!         .header("Authorization", "Token secret")
//!         .config(SessionConfiguration::new().with_speakers(2, 6))
//!         .on(EventKind::ActionItem, |event: &SessionEvent| {
//!             println!("action item: {:?}", event.data());
//!         })
//!         .connect()
//!         .await?;
//!
//!     client.send(audio_chunk)?;
//!     client.close(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

pub mod traits;
pub mod core;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use core::{
    buffer, builder, client, config, connection_state, dispatcher, events, heartbeat, session,
    builder::{states, LiveClientBuilder},
    buffer::{PendingSend, SendBuffer},
    client::LiveClient,
    codec::{classify, ControlFrame, JsonCodec},
    config::{ClientConfig, FinalizeMode, SessionConfiguration},
    connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics},
    dispatcher::{EventDispatcher, ListenerId},
    events::{ErrorEvent, ErrorKind, EventKind, SessionEvent},
    session::LiveSession,
};
