//! Live analytics session
//!
//! # Architecture
//!
//! ```text
//!  caller ──send/configure/keep_alive/finalize/request_close──┐
//!                                                             ▼
//!                                     ┌──────── state lock ────────┐
//!                                     │ ConnectionState            │
//!                                     │ SessionConfiguration       │
//!                                     │ SendBuffer                 │──> Transport::send
//!                                     │ Transport                  │
//!                                     └────────────────────────────┘
//!                                                             ▲
//!  transport ──handle_open/message/error/close────────────────┘
//!                    │
//!                    └──> MessageCodec ──> EventDispatcher ──> listeners
//! ```
//!
//! Every mutation happens under one lock. Events produced while it is held
//! are collected and dispatched after it is released, so listeners can call
//! back into the session.
//!
//! # Terminal states
//!
//! Once `Closed` or `Failed`, every control operation returns
//! [`LiveError::SessionClosed`] and transport callbacks are ignored.

use crate::core::buffer::{PendingSend, SendBuffer};
use crate::core::codec::{ControlFrame, JsonCodec};
use crate::core::config::{FinalizeMode, SessionConfiguration};
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState, Metrics};
use crate::core::dispatcher::{EventDispatcher, ListenerId};
use crate::core::events::{ErrorEvent, EventKind, SessionEvent};
use crate::error::{LiveError, Result};
use crate::message::WsMessage;
use crate::traits::{EventListener, MessageCodec, Transport};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// State guarded by the session lock
struct SessionCore {
    config: SessionConfiguration,
    /// Options configured before the socket opened, sent once it does
    pending_configure: Option<SessionConfiguration>,
    buffer: SendBuffer,
    transport: Option<Box<dyn Transport>>,
    /// A queued finalize/close moves the session to Closing once flushed
    close_after_flush: bool,
}

struct SessionShared {
    core: Mutex<SessionCore>,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    dispatcher: EventDispatcher,
    codec: Arc<dyn MessageCodec>,
    finalize_mode: FinalizeMode,
}

/// Handle to one live session
///
/// Cheap to clone; all clones drive the same session. The session (and
/// its listener registry) is dropped with the last handle.
#[derive(Clone)]
pub struct LiveSession {
    shared: Arc<SessionShared>,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("state", &self.state())
            .field("finalize_mode", &self.shared.finalize_mode)
            .finish()
    }
}

impl LiveSession {
    /// Create an `Idle` session with the JSON codec and default finalize mode
    ///
    /// # Errors
    /// `LiveError::Configuration` if `config` violates an invariant. No
    /// transport exists yet at this point.
    pub fn new(config: SessionConfiguration) -> Result<Self> {
        Self::with_codec(config, FinalizeMode::default(), Arc::new(JsonCodec))
    }

    /// Create an `Idle` session with an explicit finalize mode and codec
    pub fn with_codec(
        config: SessionConfiguration,
        finalize_mode: FinalizeMode,
        codec: Arc<dyn MessageCodec>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            shared: Arc::new(SessionShared {
                core: Mutex::new(SessionCore {
                    config,
                    pending_configure: None,
                    buffer: SendBuffer::new(),
                    transport: None,
                    close_after_flush: false,
                }),
                state: AtomicConnectionState::new(ConnectionState::Idle),
                metrics: AtomicMetrics::new(),
                dispatcher: EventDispatcher::new(),
                codec,
                finalize_mode,
            }),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Attach a transport and move `Idle → Connecting`
    ///
    /// If the transport already reports ready, the session opens at once.
    pub fn start<T: Transport>(&self, transport: T) -> Result<()> {
        {
            let mut core = self.shared.core.lock();
            match self.state() {
                ConnectionState::Idle => {}
                state if state.is_terminal() => return Err(LiveError::SessionClosed(state)),
                state => {
                    return Err(LiveError::InvalidState(format!(
                        "session already started ({:?})",
                        state
                    )))
                }
            }

            let ready = transport.is_ready();
            core.transport = Some(Box::new(transport));
            self.transition(ConnectionState::Connecting);

            if !ready {
                return Ok(());
            }
        }

        self.handle_open();
        Ok(())
    }

    /// Transport callback: the socket is ready
    ///
    /// Sends any configuration made while connecting, flushes the send
    /// buffer in submission order, then emits `Open`.
    pub fn handle_open(&self) {
        let events = {
            let mut core = self.shared.core.lock();
            let state = self.state();
            if state != ConnectionState::Connecting {
                warn!("Ignoring open signal in state {:?}", state);
                return;
            }
            self.open_and_flush(&mut core)
        };

        self.dispatch(events);
    }

    fn open_and_flush(&self, core: &mut SessionCore) -> Vec<SessionEvent> {
        self.transition(ConnectionState::Open);
        let mut events = vec![SessionEvent::Open];

        if let Some(delta) = core.pending_configure.take() {
            debug!("Sending configuration made before open");
            if let Some(failure) = self.write_control(core, &ControlFrame::Configure(delta)) {
                events.push(failure);
                return events;
            }
        }

        if !core.buffer.is_empty() {
            info!("Flushing {} buffered sends", core.buffer.len());
        }
        let mut pending = core.buffer.drain().into_iter();
        while let Some(entry) = pending.next() {
            let failure = match entry {
                PendingSend::Data(message) => self.write(core, message),
                PendingSend::Control(frame) => self.write_control(core, &frame),
            };
            if let Some(failure) = failure {
                let lost = pending.len();
                if lost > 0 {
                    warn!("Discarded {} buffered sends after flush failure", lost);
                    self.shared.metrics.add_discarded(lost as u64);
                }
                events.push(failure);
                return events;
            }
        }

        if std::mem::take(&mut core.close_after_flush) {
            self.transition(ConnectionState::Closing);
        }

        events
    }

    /// Transport callback: one inbound frame
    ///
    /// Produces exactly one event while `Open` or `Closing`; ignored in any
    /// other state.
    pub fn handle_message(&self, message: WsMessage) {
        let event = {
            let _core = self.shared.core.lock();
            let state = self.state();
            if !state.accepts_inbound() {
                debug!("Ignoring inbound frame in state {:?}", state);
                return;
            }
            self.shared.metrics.increment_received();
            self.shared.codec.decode(&message)
        };

        self.dispatch(vec![event]);
    }

    /// Transport callback: socket failure
    ///
    /// Moves any non-terminal session to `Failed` and emits `Error`.
    pub fn handle_error(&self, reason: impl fmt::Display) {
        let events = {
            let mut core = self.shared.core.lock();
            let state = self.state();
            if state.is_terminal() {
                debug!("Ignoring transport error in state {:?}: {}", state, reason);
                return;
            }
            error!("Transport error in state {:?}: {}", state, reason);
            vec![self.fail(&mut core, ErrorEvent::transport(reason.to_string()))]
        };

        self.dispatch(events);
    }

    /// Transport callback: socket closed (by either side)
    pub fn handle_close(&self, code: u16, reason: impl Into<String>) {
        let reason = reason.into();
        let events = {
            let mut core = self.shared.core.lock();
            let state = self.state();
            match state {
                ConnectionState::Connecting | ConnectionState::Open | ConnectionState::Closing => {}
                _ => {
                    debug!("Ignoring close signal in state {:?}", state);
                    return;
                }
            }

            self.transition(ConnectionState::Closed);
            self.discard_pending(&mut core);
            core.transport = None;
            vec![SessionEvent::Close { code, reason }]
        };

        self.dispatch(events);
    }

    /// Force-terminate the transport
    ///
    /// The session ends `Failed` with an `Aborted` error event. Use this
    /// when a graceful close did not complete in time.
    pub fn abort(&self, reason: impl Into<String>) {
        let events = {
            let mut core = self.shared.core.lock();
            if self.state().is_terminal() {
                return;
            }
            warn!("Aborting session");
            vec![self.fail(&mut core, ErrorEvent::aborted(reason))]
        };

        self.dispatch(events);
    }

    // ------------------------------------------------------------------
    // Session control
    // ------------------------------------------------------------------

    /// Send a payload (usually audio)
    ///
    /// Forwarded immediately when `Open`, buffered in any other live state.
    /// Never blocks. A transport failure is reported as an `Error` event.
    pub fn send(&self, payload: impl Into<WsMessage>) -> Result<()> {
        let message = payload.into();
        let events = {
            let mut core = self.shared.core.lock();
            match self.state() {
                ConnectionState::Open => self.write(&mut core, message).into_iter().collect(),
                state if state.is_terminal() => return Err(LiveError::SessionClosed(state)),
                state => {
                    debug!("Buffering {} byte send while {:?}", message.len(), state);
                    core.buffer.push(PendingSend::Data(message));
                    Vec::new()
                }
            }
        };

        self.dispatch(events);
        Ok(())
    }

    /// Merge `partial` into the live configuration
    ///
    /// - `Open`: a `Configure` frame carrying `partial` is sent now
    /// - `Idle`, `Connecting`: remembered and sent as one frame when the
    ///   socket opens, ahead of buffered sends
    /// - `Closing`: merged only
    ///
    /// # Errors
    /// `Configuration` if the merged result is invalid (nothing changes),
    /// `SessionClosed` after the session ended.
    pub fn configure(&self, partial: SessionConfiguration) -> Result<()> {
        let events = {
            let mut core = self.shared.core.lock();
            let state = self.state();
            if state.is_terminal() {
                return Err(LiveError::SessionClosed(state));
            }

            let next = core.config.merged(&partial)?;

            match state {
                ConnectionState::Open => {
                    let message = self.encode(&ControlFrame::Configure(partial))?;
                    core.config = next;
                    debug!("Sending Configure frame");
                    self.write(&mut core, message).into_iter().collect()
                }
                ConnectionState::Idle | ConnectionState::Connecting => {
                    core.config = next;
                    core.pending_configure
                        .get_or_insert_with(SessionConfiguration::default)
                        .merge(&partial);
                    Vec::new()
                }
                _ => {
                    core.config = next;
                    Vec::new()
                }
            }
        };

        self.dispatch(events);
        Ok(())
    }

    /// Send `KeepAlive`; a no-op unless `Open`
    pub fn keep_alive(&self) -> Result<()> {
        let events = {
            let mut core = self.shared.core.lock();
            match self.state() {
                ConnectionState::Open => self
                    .write_control(&mut core, &ControlFrame::KeepAlive)
                    .into_iter()
                    .collect(),
                state if state.is_terminal() => return Err(LiveError::SessionClosed(state)),
                state => {
                    debug!("Skipping keep-alive while {:?}", state);
                    Vec::new()
                }
            }
        };

        self.dispatch(events);
        Ok(())
    }

    /// Ask the server to flush pending partial results
    ///
    /// With [`FinalizeMode::Close`] the session moves to `Closing`; with
    /// [`FinalizeMode::SignalOnly`] it stays `Open`.
    pub fn finalize(&self) -> Result<()> {
        let closes = self.shared.finalize_mode == FinalizeMode::Close;
        self.closing_frame(ControlFrame::Finalize, closes)
    }

    /// Ask the server to close the stream gracefully
    ///
    /// Moves `Open → Closing`. The session is `Closed` only once the
    /// transport confirms, which emits `Close`.
    pub fn request_close(&self) -> Result<()> {
        self.closing_frame(ControlFrame::CloseStream, true)
    }

    fn closing_frame(&self, frame: ControlFrame, closes: bool) -> Result<()> {
        let events = {
            let mut core = self.shared.core.lock();
            match self.state() {
                ConnectionState::Open => {
                    let failure = self.write_control(&mut core, &frame);
                    if failure.is_none() && closes {
                        self.transition(ConnectionState::Closing);
                    }
                    failure.into_iter().collect()
                }
                ConnectionState::Closing => self.write_control(&mut core, &frame).into_iter().collect(),
                state if state.is_terminal() => return Err(LiveError::SessionClosed(state)),
                state => {
                    debug!("Queueing {} while {:?}", frame.name(), state);
                    core.buffer.push(PendingSend::Control(frame));
                    core.close_after_flush |= closes;
                    Vec::new()
                }
            }
        };

        self.dispatch(events);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Register a listener for one event kind
    pub fn on<L: EventListener>(&self, kind: EventKind, listener: L) -> ListenerId {
        self.shared.dispatcher.on(kind, listener)
    }

    /// Register a listener for every event kind
    pub fn on_any<L: EventListener>(&self, listener: L) -> ListenerId {
        self.shared.dispatcher.on_any(listener)
    }

    pub(crate) fn register_boxed(&self, kind: Option<EventKind>, listener: Box<dyn EventListener>) -> ListenerId {
        match kind {
            Some(kind) => self.shared.dispatcher.on_boxed(kind, listener),
            None => self.shared.dispatcher.on_any_boxed(listener),
        }
    }

    /// Remove a listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.shared.dispatcher.off(id)
    }

    pub fn clear_listeners(&self) {
        self.shared.dispatcher.clear();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    #[inline]
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.shared.state.is_open()
    }

    /// Copy of the live configuration
    pub fn configuration(&self) -> SessionConfiguration {
        self.shared.core.lock().config.clone()
    }

    /// Number of sends waiting for the socket to open
    pub fn pending_sends(&self) -> usize {
        self.shared.core.lock().buffer.len()
    }

    pub fn finalize_mode(&self) -> FinalizeMode {
        self.shared.finalize_mode
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            frames_sent: self.shared.metrics.frames_sent(),
            frames_received: self.shared.metrics.frames_received(),
            sends_discarded: self.shared.metrics.sends_discarded(),
            connection_state: self.state(),
        }
    }

    // ------------------------------------------------------------------
    // Internals (callers hold the session lock)
    // ------------------------------------------------------------------

    fn transition(&self, next: ConnectionState) {
        let current = self.state();
        debug_assert!(
            current.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            current,
            next
        );
        self.shared.state.set(next);
        info!("Session state {:?} -> {:?}", current, next);
    }

    fn encode(&self, frame: &ControlFrame) -> Result<WsMessage> {
        self.shared.codec.encode(frame)
    }

    /// Hand one frame to the transport; on failure the session fails and
    /// the resulting `Error` event is returned
    fn write(&self, core: &mut SessionCore, message: WsMessage) -> Option<SessionEvent> {
        let transport = match core.transport.as_mut() {
            Some(transport) => transport,
            None => {
                return Some(self.fail(core, ErrorEvent::transport("no transport attached")));
            }
        };

        match transport.send(message) {
            Ok(()) => {
                self.shared.metrics.increment_sent();
                None
            }
            Err(e) => {
                error!("Transport send failed: {}", e);
                Some(self.fail(core, ErrorEvent::transport(e.to_string())))
            }
        }
    }

    fn write_control(&self, core: &mut SessionCore, frame: &ControlFrame) -> Option<SessionEvent> {
        match self.encode(frame) {
            Ok(message) => {
                debug!("Sending {} frame", frame.name());
                self.write(core, message)
            }
            Err(e) => {
                error!("Failed to encode {} frame: {}", frame.name(), e);
                None
            }
        }
    }

    fn fail(&self, core: &mut SessionCore, error: ErrorEvent) -> SessionEvent {
        self.transition(ConnectionState::Failed);
        self.discard_pending(core);
        if let Some(mut transport) = core.transport.take() {
            transport.close();
        }
        SessionEvent::Error(error)
    }

    fn discard_pending(&self, core: &mut SessionCore) {
        let discarded = core.buffer.discard();
        core.pending_configure = None;
        core.close_after_flush = false;
        if discarded > 0 {
            warn!("Discarded {} sends that were never flushed", discarded);
            self.shared.metrics.add_discarded(discarded as u64);
        }
    }

    fn dispatch(&self, events: Vec<SessionEvent>) {
        for event in &events {
            self.shared.dispatcher.emit(event);
        }
    }
}
