//! Common test utilities for live analytics integration tests
//!
//! - `RecordingTransport`: in-memory transport that records what a session sends
//! - `EventLog`: listener that records every event a session emits
//! - `MockLiveServer`: WebSocket server that records inbound frames and
//!   answers control frames the way a live analytics endpoint would

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use live_analytics::{EventKind, LiveSession, SessionEvent, Transport, WsMessage};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Default)]
struct Recorded {
    sent: Vec<WsMessage>,
    closed: bool,
    failing: bool,
    ready: bool,
}

/// Transport double; clones share one record
#[derive(Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that is already connected when the session starts
    pub fn ready() -> Self {
        let transport = Self::default();
        transport.inner.lock().ready = true;
        transport
    }

    pub fn sent(&self) -> Vec<WsMessage> {
        self.inner.lock().sent.clone()
    }

    /// Sent text frames, binary frames skipped
    pub fn sent_text(&self) -> Vec<String> {
        self.inner
            .lock()
            .sent
            .iter()
            .filter_map(|m| m.as_text().map(str::to_string))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Make every following send fail
    pub fn fail_sends(&self) {
        self.inner.lock().failing = true;
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, message: WsMessage) -> live_analytics::Result<()> {
        let mut inner = self.inner.lock();
        if inner.failing {
            return Err(live_analytics::LiveError::Transport("socket reset".into()));
        }
        inner.sent.push(message);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.inner.lock().ready
    }

    fn close(&mut self) {
        self.inner.lock().closed = true;
    }
}

/// Records every event emitted by a session
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventLog {
    pub fn attach(session: &LiveSession) -> Self {
        let log = Self::default();
        let events = Arc::clone(&log.events);
        session.on_any(move |event: &SessionEvent| events.lock().push(event.clone()));
        log
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(SessionEvent::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

/// Build a session in `Connecting` with a recording transport
pub fn connecting_session(config: live_analytics::SessionConfiguration) -> (LiveSession, RecordingTransport, EventLog) {
    let session = LiveSession::new(config).unwrap();
    let log = EventLog::attach(&session);
    let transport = RecordingTransport::new();
    session.start(transport.clone()).unwrap();
    (session, transport, log)
}

/// Build an `Open` session with a recording transport
pub fn open_session() -> (LiveSession, RecordingTransport, EventLog) {
    let (session, transport, log) = connecting_session(Default::default());
    session.handle_open();
    (session, transport, log)
}

/// What the mock server saw on one connection
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Upgrade request path and query
    Connected(String),
    Frame(Message),
}

/// WebSocket server standing in for a live analytics endpoint
///
/// - `CloseStream` is answered with a normal close (1000)
/// - Frames pushed through [`push`](Self::push) go to the connected client
/// - With `ignore_close`, `CloseStream` is recorded but never answered
pub struct MockLiveServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
    seen_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEvent>>,
    push_tx: mpsc::UnboundedSender<Message>,
}

impl MockLiveServer {
    pub async fn start() -> Self {
        Self::start_with(false).await
    }

    pub async fn start_ignoring_close() -> Self {
        Self::start_with(true).await
    }

    async fn start_with(ignore_close: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            tokio::select! {
                result = listener.accept() => {
                    if let Ok((stream, _)) = result {
                        Self::handle_connection(stream, seen_tx, push_rx, ignore_close, shutdown_clone).await;
                    }
                }
                _ = shutdown_clone.notified() => {}
            }
        });

        Self {
            addr,
            shutdown,
            seen_rx: tokio::sync::Mutex::new(seen_rx),
            push_tx,
        }
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        seen_tx: mpsc::UnboundedSender<ServerEvent>,
        mut push_rx: mpsc::UnboundedReceiver<Message>,
        ignore_close: bool,
        shutdown: Arc<Notify>,
    ) {
        use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

        let path_tx = seen_tx.clone();
        let callback = move |request: &Request, response: Response| {
            let target = request
                .uri()
                .path_and_query()
                .map(|p| p.to_string())
                .unwrap_or_default();
            let _ = path_tx.send(ServerEvent::Connected(target));
            Ok::<Response, ErrorResponse>(response)
        };

        let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(msg)) => {
                            let close_requested = msg
                                .to_text()
                                .map(|t| t.contains(r#""type":"CloseStream""#))
                                .unwrap_or(false);
                            let _ = seen_tx.send(ServerEvent::Frame(msg.clone()));

                            if msg.is_close() {
                                break;
                            }
                            if close_requested && !ignore_close {
                                let frame = CloseFrame {
                                    code: CloseCode::Normal,
                                    reason: "stream closed".into(),
                                };
                                let _ = write.send(Message::Close(Some(frame))).await;
                            }
                        }
                        Some(Err(_)) | None => break,
                    }
                }
                pushed = push_rx.recv() => {
                    match pushed {
                        Some(msg) => {
                            if write.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}/v1/live", self.addr)
    }

    /// Send a frame to the connected client
    pub fn push(&self, msg: Message) {
        let _ = self.push_tx.send(msg);
    }

    pub fn push_text(&self, text: &str) {
        self.push(Message::Text(text.to_string()));
    }

    /// Next thing the server observed, or `None` after `timeout`
    pub async fn next_seen(&self, timeout: Duration) -> Option<ServerEvent> {
        let mut rx = self.seen_rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    /// Collect `count` data or control frames, skipping connection records
    pub async fn frames(&self, count: usize, timeout: Duration) -> Vec<Message> {
        let mut frames = Vec::new();
        while frames.len() < count {
            match self.next_seen(timeout).await {
                Some(ServerEvent::Frame(msg)) => frames.push(msg),
                Some(ServerEvent::Connected(_)) => continue,
                None => break,
            }
        }
        frames
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockLiveServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
