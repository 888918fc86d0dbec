pub mod states;

use crate::core::client::{LiveClient, PendingListener};
use crate::core::codec::JsonCodec;
use crate::core::config::{ClientConfig, FinalizeMode, SessionConfiguration};
use crate::core::events::EventKind;
use crate::traits::*;
use states::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`LiveClient`]
///
/// The endpoint URL is required before `connect()` is available. Analysis
/// options, headers, keep-alive and listeners are optional.
///
/// Listeners added here are registered before the socket opens, so they
/// observe the `Open` event.
pub struct LiveClientBuilder<U>
where
    U: UrlState,
{
    _state: TypeState<U>,
    url: Option<String>,
    session: SessionConfiguration,
    headers: HashMap<String, String>,
    keep_alive: Option<Duration>,
    finalize_mode: FinalizeMode,
    codec: Option<Arc<dyn MessageCodec>>,
    listeners: Vec<PendingListener>,
    event_channel: bool,
}

impl LiveClientBuilder<NoUrl> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            url: None,
            session: SessionConfiguration::default(),
            headers: HashMap::new(),
            keep_alive: None,
            finalize_mode: FinalizeMode::default(),
            codec: None,
            listeners: Vec::new(),
            event_channel: false,
        }
    }

    pub fn url(self, url: impl Into<String>) -> LiveClientBuilder<HasUrl> {
        LiveClientBuilder {
            _state: TypeState::new(),
            url: Some(url.into()),
            session: self.session,
            headers: self.headers,
            keep_alive: self.keep_alive,
            finalize_mode: self.finalize_mode,
            codec: self.codec,
            listeners: self.listeners,
            event_channel: self.event_channel,
        }
    }
}

impl Default for LiveClientBuilder<NoUrl> {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveClientBuilder<HasUrl> {
    /// Start from a loaded [`ClientConfig`]
    pub fn from_config(config: ClientConfig) -> Self {
        LiveClientBuilder::new()
            .url(config.url)
            .headers(config.headers)
            .finalize_mode(config.finalize_mode)
            .keep_alive_interval(config.keep_alive_interval)
    }

    /// Validate the configuration and start connecting
    ///
    /// Returns as soon as the session is `Connecting`; the socket opens in
    /// the background. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// `LiveError::Configuration` for invalid analysis options or an
    /// endpoint that is not a `ws://`/`wss://` URL. No socket is opened.
    pub async fn connect(self) -> Result<LiveClient> {
        let url = self
            .url
            .ok_or_else(|| LiveError::configuration("endpoint URL not set"))?;
        let codec = self.codec.unwrap_or_else(|| Arc::new(JsonCodec));

        let config = ClientConfig {
            url,
            headers: self.headers,
            keep_alive_interval: self.keep_alive,
            finalize_mode: self.finalize_mode,
        };

        LiveClient::new(config, self.session, codec, self.listeners, self.event_channel).await
    }
}

// Optional configuration methods
impl<U> LiveClientBuilder<U>
where
    U: UrlState,
{
    /// Analysis options sent with the connection
    pub fn config(mut self, config: SessionConfiguration) -> Self {
        self.session = config;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Send `KeepAlive` every `interval` while open
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = Some(interval);
        self
    }

    fn keep_alive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn finalize_mode(mut self, mode: FinalizeMode) -> Self {
        self.finalize_mode = mode;
        self
    }

    /// Replace the default JSON codec
    pub fn codec(mut self, codec: impl MessageCodec) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    pub fn on(mut self, kind: EventKind, listener: impl EventListener) -> Self {
        self.listeners.push(PendingListener {
            kind: Some(kind),
            listener: Box::new(listener),
        });
        self
    }

    /// Queue every event for `LiveClient::recv_event` / `next_event`
    ///
    /// The queue is unbounded; a caller that enables it must keep reading.
    pub fn event_channel(mut self) -> Self {
        self.event_channel = true;
        self
    }

    pub fn on_any(mut self, listener: impl EventListener) -> Self {
        self.listeners.push(PendingListener {
            kind: None,
            listener: Box::new(listener),
        });
        self
    }
}
