use crate::core::codec::ControlFrame;
use crate::core::events::SessionEvent;
use crate::error::Result;
use crate::message::WsMessage;

/// Wire format of a live session
///
/// The codec has two responsibilities:
/// 1. Encode outbound control frames into transport messages
/// 2. Decode every inbound transport message into exactly one event
///
/// Decoding is infallible by contract: malformed input becomes an
/// `Error` event and unknown shapes become `Unhandled`, so a bad frame can
/// never take the session down.
///
/// # Performance
/// `decode` runs on the transport's I/O task for every frame. Keep it cheap.
pub trait MessageCodec: Send + Sync + 'static {
    /// Encode a control frame
    fn encode(&self, frame: &ControlFrame) -> Result<WsMessage>;

    /// Decode one inbound frame into one event
    fn decode(&self, message: &WsMessage) -> SessionEvent;
}
