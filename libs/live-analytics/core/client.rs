use crate::core::config::{ClientConfig, SessionConfiguration};
use crate::core::connection_state::{ConnectionState, Metrics};
use crate::core::dispatcher::ListenerId;
use crate::core::events::{EventKind, SessionEvent};
use crate::core::heartbeat::spawn_keep_alive;
use crate::core::session::LiveSession;
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, RecvError};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::{http, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the server's close frame carried none
const CLOSE_NO_STATUS: u16 = 1005;
/// Close code reported when the socket dropped without a close frame
const CLOSE_ABNORMAL: u16 = 1006;

/// Commands from the session's transport to the I/O task
#[derive(Debug)]
enum ClientCommand {
    /// Write a frame to the socket
    Send(WsMessage),
    /// Tear the socket down
    Close,
}

/// Listener registered through the builder, attached before the socket opens
pub(crate) struct PendingListener {
    pub(crate) kind: Option<EventKind>,
    pub(crate) listener: Box<dyn EventListener>,
}

/// Outbound half of a tungstenite connection
///
/// Frames are handed to the I/O task over an unbounded channel, so `send`
/// never blocks the caller.
struct WsTransport {
    command_tx: UnboundedSender<ClientCommand>,
    ready: Arc<AtomicBool>,
}

impl Transport for WsTransport {
    fn send(&mut self, message: WsMessage) -> Result<()> {
        self.command_tx
            .send(ClientCommand::Send(message))
            .map_err(|_| LiveError::Transport("connection task has exited".into()))
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire) && !self.command_tx.is_closed()
    }

    fn close(&mut self) {
        let _ = self.command_tx.send(ClientCommand::Close);
    }
}

/// Live analytics session over a WebSocket
///
/// Owns the I/O task that drives one [`LiveSession`]. Events are delivered
/// to registered listeners. A client built with
/// [`event_channel`](crate::core::builder::LiveClientBuilder::event_channel)
/// also queues every event for [`recv_event`](Self::recv_event) /
/// [`next_event`](Self::next_event); without it those return nothing.
///
/// Dropping the client aborts a session that is still running.
pub struct LiveClient {
    session: LiveSession,
    url: Url,
    event_rx: Option<Receiver<SessionEvent>>,
    listener_id: Option<ListenerId>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl LiveClient {
    /// Validate, open the socket in the background and return at once
    ///
    /// Called by the builder's `connect()`. The session starts in
    /// `Connecting`; sends made before the socket opens are buffered.
    pub(crate) async fn new(
        config: ClientConfig,
        session_config: SessionConfiguration,
        codec: Arc<dyn MessageCodec>,
        listeners: Vec<PendingListener>,
        event_channel: bool,
    ) -> Result<Self> {
        let session = LiveSession::with_codec(session_config, config.finalize_mode, codec)?;
        let url = session.configuration().connection_url(&config.url)?;
        let request = build_request(&url, &config.headers)?;

        for pending in listeners {
            session.register_boxed(pending.kind, pending.listener);
        }
        let (event_rx, listener_id) = if event_channel {
            let (event_tx, event_rx) = unbounded();
            let id = session.on_any(ChannelListener::new(event_tx));
            (Some(event_rx), Some(id))
        } else {
            (None, None)
        };

        let (command_tx, command_rx) = unbounded_channel();
        let ready = Arc::new(AtomicBool::new(false));
        session.start(WsTransport {
            command_tx,
            ready: Arc::clone(&ready),
        })?;

        let task_handle = {
            let session = session.clone();
            let keep_alive = config.keep_alive_interval;
            let endpoint = config.url.clone();

            tokio::spawn(async move {
                run_client(endpoint, request, session, command_rx, ready, keep_alive).await;
            })
        };

        Ok(Self {
            session,
            url,
            event_rx,
            listener_id,
            task_handle: Some(task_handle),
        })
    }

    /// The session this client drives
    pub fn session(&self) -> &LiveSession {
        &self.session
    }

    /// Connection URL including the configuration query
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn metrics(&self) -> Metrics {
        self.session.metrics()
    }

    pub fn send(&self, payload: impl Into<WsMessage>) -> Result<()> {
        self.session.send(payload)
    }

    pub fn configure(&self, partial: SessionConfiguration) -> Result<()> {
        self.session.configure(partial)
    }

    pub fn keep_alive(&self) -> Result<()> {
        self.session.keep_alive()
    }

    pub fn finalize(&self) -> Result<()> {
        self.session.finalize()
    }

    pub fn request_close(&self) -> Result<()> {
        self.session.request_close()
    }

    pub fn abort(&self, reason: impl Into<String>) {
        self.session.abort(reason)
    }

    pub fn on<L: EventListener>(&self, kind: EventKind, listener: L) -> ListenerId {
        self.session.on(kind, listener)
    }

    pub fn on_any<L: EventListener>(&self, listener: L) -> ListenerId {
        self.session.on_any(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.session.off(id)
    }

    /// Whether events are queued for `recv_event`/`next_event`
    pub fn has_event_channel(&self) -> bool {
        self.event_rx.is_some()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<SessionEvent> {
        self.event_rx.as_ref()?.try_recv().ok()
    }

    /// Receive an event (blocking)
    ///
    /// Fails at once when the client has no event channel.
    pub fn recv_event(&self) -> std::result::Result<SessionEvent, RecvError> {
        match &self.event_rx {
            Some(rx) => rx.recv(),
            None => Err(RecvError),
        }
    }

    /// Wait up to `timeout` for the next event without blocking the runtime
    pub async fn next_event(&self, timeout: Duration) -> Option<SessionEvent> {
        let rx = self.event_rx.clone()?;
        tokio::task::spawn_blocking(move || rx.recv_timeout(timeout).ok())
            .await
            .ok()
            .flatten()
    }

    /// Close gracefully, aborting if the server does not finish in time
    ///
    /// Sends `CloseStream` and waits for the socket to close. After
    /// `timeout` the session is aborted and `LiveError::Timeout` returned.
    pub async fn close(mut self, timeout: Duration) -> Result<()> {
        info!("Closing live session");

        match self.session.request_close() {
            Ok(()) => {}
            Err(LiveError::SessionClosed(state)) => debug!("Session already {:?}", state),
            Err(e) => return Err(e),
        }

        let handle = match self.task_handle.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(_) => {
                info!("Session closed in state {:?}", self.session.state());
                Ok(())
            }
            Err(_) => {
                warn!("Close did not complete within {:?}, aborting", timeout);
                self.session.abort("close timed out");
                Err(LiveError::Timeout(format!(
                    "close did not complete within {:?}",
                    timeout
                )))
            }
        }
    }
}

impl Drop for LiveClient {
    fn drop(&mut self) {
        if let Some(id) = self.listener_id.take() {
            self.session.off(id);
        }
        if self.task_handle.is_some() && !self.session.state().is_terminal() {
            debug!("Client dropped while session is live, aborting");
            self.session.abort("client dropped");
        }
    }
}

/// Upgrade request for `url` with extra headers applied
fn build_request(url: &Url, headers: &HashMap<String, String>) -> Result<Request> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| LiveError::configuration(format!("invalid endpoint {}: {}", url, e)))?;

    for (key, value) in headers {
        match key.parse::<http::header::HeaderName>() {
            Ok(header_name) => match value.parse::<http::header::HeaderValue>() {
                Ok(header_value) => {
                    request.headers_mut().insert(header_name, header_value);
                }
                Err(_) => {
                    warn!("Invalid header value for key '{}'", key);
                }
            },
            Err(_) => {
                warn!("Invalid header name: {}", key);
            }
        }
    }

    Ok(request)
}

/// I/O task: connect, pump frames both ways, report lifecycle to the session
async fn run_client(
    endpoint: String,
    request: Request,
    session: LiveSession,
    mut command_rx: UnboundedReceiver<ClientCommand>,
    ready: Arc<AtomicBool>,
    keep_alive: Option<Duration>,
) {
    let connection_result = tokio::select! {
        result = connect_async(request) => result,
        _ = closed_while_connecting(&mut command_rx) => {
            debug!("Session ended while connecting");
            return;
        }
    };

    let ws_stream = match connection_result {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", endpoint, e);
            session.handle_error(format!("Failed to connect: {}", e));
            return;
        }
    };

    info!("Connected to {}", endpoint);
    ready.store(true, Ordering::Release);
    session.handle_open();

    let keep_alive = keep_alive.map(|interval| spawn_keep_alive(interval, session.clone()));

    message_loop(ws_stream, &session, &mut command_rx).await;

    ready.store(false, Ordering::Release);
    if let Some((_handle, shutdown_tx)) = keep_alive {
        let _ = shutdown_tx.send(());
    }

    info!("Client task exiting");
}

/// Resolves once the session closes its transport before the socket opened
async fn closed_while_connecting(command_rx: &mut UnboundedReceiver<ClientCommand>) {
    while let Some(command) = command_rx.recv().await {
        match command {
            ClientCommand::Close => return,
            ClientCommand::Send(_) => warn!("Dropping frame submitted before the socket opened"),
        }
    }
}

/// Main message loop
async fn message_loop(
    ws_stream: WsStream,
    session: &LiveSession,
    command_rx: &mut UnboundedReceiver<ClientCommand>,
) {
    let (mut write, mut read) = ws_stream.split();
    let mut close_frame: Option<(u16, String)> = None;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((CLOSE_NO_STATUS, String::new()));
                        debug!("Server sent close frame: {} {}", code, reason);
                        close_frame = Some((code, reason));
                    }
                    Some(Ok(msg)) => {
                        if let Some(ws_msg) = tungstenite_to_ws_message(msg) {
                            session.handle_message(ws_msg);
                        }
                    }
                    Some(Err(e)) => {
                        match close_frame.take() {
                            Some((code, reason)) => session.handle_close(code, reason),
                            None => {
                                error!("WebSocket error: {}", e);
                                session.handle_error(format!("WebSocket error: {}", e));
                            }
                        }
                        return;
                    }
                    None => {
                        let (code, reason) = close_frame
                            .take()
                            .unwrap_or_else(|| (CLOSE_ABNORMAL, "stream ended".to_string()));
                        info!("WebSocket closed: {} {}", code, reason);
                        session.handle_close(code, reason);
                        return;
                    }
                }
            }

            cmd = command_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(msg)) => {
                        if let Err(e) = write.send(ws_message_to_tungstenite(msg)).await {
                            error!("Failed to send frame: {}", e);
                            session.handle_error(format!("Failed to send frame: {}", e));
                            return;
                        }
                    }
                    Some(ClientCommand::Close) | None => {
                        debug!("Transport closed by session, closing socket");
                        let _ = write.close().await;
                        return;
                    }
                }
            }
        }
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text),
        WsMessage::Binary(data) => Message::Binary(data),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
