//! Lock-free view of a session's lifecycle state and traffic counters
//!
//! All transitions are made by the session while it holds its state lock;
//! the atomics exist so callers can read the state without taking it.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of a live session
///
/// ```text
/// Idle ──start──> Connecting ──open──> Open ──request_close/finalize──> Closing
///                     │                 │                                 │
///                     │                 └─────────────close───────────────┴──> Closed
///                     └──error──> Failed <──────────error (any non-terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
    Closed = 4,
    Failed = 5,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Idle,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            3 => ConnectionState::Closing,
            4 => ConnectionState::Closed,
            _ => ConnectionState::Failed,
        }
    }

    /// Closed or Failed; nothing leaves these states
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }

    /// States in which inbound frames are dispatched
    #[inline]
    pub fn accepts_inbound(self) -> bool {
        matches!(self, ConnectionState::Open | ConnectionState::Closing)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Idle, Connecting) => true,
            (Connecting, Open) => true,
            (Connecting, Closed) => true,
            (Open, Closing) => true,
            (Open, Closed) | (Closing, Closed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Atomic wrapper around [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.get() == ConnectionState::Open
    }
}

/// Frame counters for one session
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_sent: AtomicU64,
    frames_received: AtomicU64,
    sends_discarded: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_discarded(&self, count: u64) {
        self.sends_discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn sends_discarded(&self) -> u64 {
        self.sends_discarded.load(Ordering::Relaxed)
    }
}

/// Session metrics snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub sends_discarded: u64,
    pub connection_state: ConnectionState,
}
