//! Typed publish/subscribe registry
//!
//! # Delivery
//!
//! - **Synchronous**: `emit` returns after every listener ran, unless a
//!   delivery is already in progress (see below)
//! - **Registration order** within a kind
//! - **Arrival order** across events: an event emitted while listeners are
//!   running (a listener that sends and fails, say) is queued and delivered
//!   to every listener once the current event has reached all of them
//! - **Isolated**: a listener that errors or panics is logged and skipped;
//!   the rest still run and the registry stays intact
//! - **Lock-free callbacks**: the registry lock is released before any
//!   listener runs, so listeners may register or remove listeners

use crate::core::events::{EventKind, SessionEvent};
use crate::traits::EventListener;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Handle returned by registration, used to remove the listener again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type SharedListener = Arc<Mutex<Box<dyn EventListener>>>;

/// Events waiting for delivery; `active` while some caller is draining
#[derive(Default)]
struct DeliveryQueue {
    events: VecDeque<SessionEvent>,
    active: bool,
}

/// Event kind → ordered listeners
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<HashMap<EventKind, Vec<(ListenerId, SharedListener)>>>,
    queue: Mutex<DeliveryQueue>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `listener` for one kind
    pub fn on<L: EventListener>(&self, kind: EventKind, listener: L) -> ListenerId {
        self.on_boxed(kind, Box::new(listener))
    }

    pub fn on_boxed(&self, kind: EventKind, listener: Box<dyn EventListener>) -> ListenerId {
        let id = self.next_id();
        let shared: SharedListener = Arc::new(Mutex::new(listener));
        self.listeners.write().entry(kind).or_default().push((id, shared));
        debug!("Registered listener {:?} for {}", id, kind);
        id
    }

    /// Register one listener for every kind
    ///
    /// The listener shares a single [`ListenerId`] across kinds, so one
    /// [`off`](Self::off) removes it everywhere.
    pub fn on_any<L: EventListener>(&self, listener: L) -> ListenerId {
        self.on_any_boxed(Box::new(listener))
    }

    pub fn on_any_boxed(&self, listener: Box<dyn EventListener>) -> ListenerId {
        let id = self.next_id();
        let shared: SharedListener = Arc::new(Mutex::new(listener));
        let mut listeners = self.listeners.write();
        for kind in EventKind::ALL {
            listeners.entry(kind).or_default().push((id, Arc::clone(&shared)));
        }
        debug!("Registered listener {:?} for all kinds", id);
        id
    }

    /// Remove a listener; returns false when the id was unknown
    pub fn off(&self, id: ListenerId) -> bool {
        let mut removed = false;
        let mut listeners = self.listeners.write();
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            removed |= entries.len() != before;
        }
        listeners.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver `event` to every listener registered for its kind
    ///
    /// Returns how many deliveries completed without error during this
    /// call, including queued events it drained.
    ///
    /// When a delivery is already running (on this thread, from inside a
    /// listener, or on another thread) the event is queued behind the ones
    /// before it and `0` is returned; the running delivery hands it to
    /// every listener in order.
    pub fn emit(&self, event: &SessionEvent) -> usize {
        {
            let mut queue = self.queue.lock();
            queue.events.push_back(event.clone());
            if queue.active {
                debug!("Delivery in progress, queued {}", event.kind());
                return 0;
            }
            queue.active = true;
        }

        let mut delivered = 0;
        loop {
            let next = {
                let mut queue = self.queue.lock();
                match queue.events.pop_front() {
                    Some(next) => next,
                    None => {
                        queue.active = false;
                        break;
                    }
                }
            };
            delivered += self.deliver(&next);
        }

        delivered
    }

    fn deliver(&self, event: &SessionEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<(ListenerId, SharedListener)> = match self.listeners.read().get(&kind) {
            Some(entries) => entries.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for (id, listener) in targets {
            let mut guard = listener.lock();
            match panic::catch_unwind(AssertUnwindSafe(|| guard.handle(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!("Listener {:?} failed on {}: {}", id, kind, e);
                }
                Err(payload) => {
                    error!("Listener {:?} panicked on {}: {}", id, kind, panic_message(&*payload));
                }
            }
        }

        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
