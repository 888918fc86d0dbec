//! Keep-alive ticker
//!
//! ```text
//! ┌─────────────────────┐
//! │  Keep-alive Task    │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Every X interval:  │
//! │  1. Wait for tick   │
//! │  2. keep_alive() ───┼──> LiveSession ──> Transport ──> WebSocket
//! │  3. Repeat          │
//! └─────────────────────┘
//! ```
//!
//! The task stops on its shutdown signal or once the session ends. Ticks
//! while the session is not `Open` are no-ops inside the session.

use crate::core::session::LiveSession;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::time::Duration;
use tracing::debug;

/// Send `KeepAlive` through `session` every `interval`
///
/// The first frame goes out one full interval after start.
pub async fn keep_alive_task(interval: Duration, session: LiveSession, shutdown_rx: Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("Keep-alive task started with interval: {:?}", interval);

    loop {
        match shutdown_rx.try_recv() {
            Ok(()) => {
                debug!("Keep-alive task received shutdown signal");
                break;
            }
            Err(TryRecvError::Disconnected) => {
                debug!("Keep-alive shutdown channel disconnected");
                break;
            }
            Err(TryRecvError::Empty) => {}
        }

        ticker.tick().await;

        if session.keep_alive().is_err() {
            debug!("Session ended, stopping keep-alive task");
            break;
        }
    }

    debug!("Keep-alive task exiting");
}

/// Spawn a keep-alive task
///
/// Returns the task handle and the sender that stops it.
pub fn spawn_keep_alive(interval: Duration, session: LiveSession) -> (tokio::task::JoinHandle<()>, Sender<()>) {
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

    let handle = tokio::spawn(async move {
        keep_alive_task(interval, session, shutdown_rx).await;
    });

    (handle, shutdown_tx)
}
