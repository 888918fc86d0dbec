use crate::error::Result;
use crate::message::WsMessage;

/// Outbound half of the transport boundary
///
/// A session depends only on this contract. The inbound half is the set of
/// callbacks on [`LiveSession`](crate::core::session::LiveSession):
/// `handle_open`, `handle_message`, `handle_error` and `handle_close`,
/// which the transport invokes as the socket changes state.
///
/// Implementations must not block: `send` hands the frame off (to a
/// channel, an I/O task, a test recorder) and returns.
///
/// # Example
///
/// ```ignore
/// struct Recorder(Arc<Mutex<Vec<WsMessage>>>);
///
/// impl Transport for Recorder {
///     fn send(&mut self, message: WsMessage) -> Result<()> {
///         self.0.lock().push(message);
///         Ok(())
///     }
///
///     fn is_ready(&self) -> bool {
///         true
///     }
///
///     fn close(&mut self) {}
/// }
/// ```
pub trait Transport: Send + 'static {
    /// Hand one frame to the socket
    ///
    /// # Returns
    /// * `Ok(())` - Frame accepted for transmission
    /// * `Err(LiveError::Transport)` - Socket is gone; the session fails
    fn send(&mut self, message: WsMessage) -> Result<()>;

    /// Whether the socket can currently accept frames
    fn is_ready(&self) -> bool;

    /// Force-terminate the socket
    ///
    /// Used when a session is aborted. Must be idempotent.
    fn close(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, message: WsMessage) -> Result<()> {
        (**self).send(message)
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
