use crate::core::codec::ControlFrame;
use crate::message::WsMessage;
use std::collections::VecDeque;

/// One entry waiting for the transport to open
#[derive(Debug, Clone, PartialEq)]
pub enum PendingSend {
    /// Caller payload, usually audio
    Data(WsMessage),
    /// Control frame issued before the socket was ready
    Control(ControlFrame),
}

/// FIFO of sends submitted before the transport was ready
///
/// Owned by exactly one session. Entries leave either through
/// [`drain`](Self::drain), in submission order, or through
/// [`discard`](Self::discard) when the session ends without opening.
#[derive(Debug, Default)]
pub struct SendBuffer {
    queue: VecDeque<PendingSend>,
}

impl SendBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PendingSend) {
        self.queue.push_back(entry);
    }

    /// Take every entry, oldest first, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<PendingSend> {
        self.queue.drain(..).collect()
    }

    /// Drop every entry; returns how many were dropped
    pub fn discard(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
