use crate::core::events::SessionEvent;
use crate::error::{LiveError, Result};
use crossbeam_channel::Sender;

/// Listener invoked by the event dispatcher
///
/// Listeners run synchronously, one event at a time, in registration order,
/// on whichever thread is delivering (usually the transport's I/O task). No
/// session lock is held while a listener runs, so a listener may call
/// session control operations or register further listeners; events those
/// calls raise are delivered after the current one.
///
/// Plain closures taking `&SessionEvent` are listeners too.
///
/// # Errors
/// A returned error is logged and delivery continues with the next
/// listener. Panics are caught and treated the same way.
///
/// # Example
///
/// ```ignore
/// session.on(EventKind::SpeakerChange, |event: &SessionEvent| {
///     if let Some(data) = event.data() {
///         println!("speaker change: {}", data);
///     }
/// });
/// ```
pub trait EventListener: Send + 'static {
    /// Handle one event
    fn handle(&mut self, event: &SessionEvent) -> Result<()>;
}

impl<F> EventListener for F
where
    F: FnMut(&SessionEvent) + Send + 'static,
{
    fn handle(&mut self, event: &SessionEvent) -> Result<()> {
        self(event);
        Ok(())
    }
}

/// Listener that forwards every event into a channel
///
/// Lets callers consume a session as a stream of events instead of
/// registering callbacks.
pub struct ChannelListener {
    tx: Sender<SessionEvent>,
}

impl ChannelListener {
    pub fn new(tx: Sender<SessionEvent>) -> Self {
        Self { tx }
    }
}

impl EventListener for ChannelListener {
    fn handle(&mut self, event: &SessionEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|e| LiveError::ChannelSend(e.to_string()))
    }
}
