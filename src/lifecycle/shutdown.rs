//! Cancellation signal for background sweeps.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// One-shot cancel signal shared by every migration sweep of an endpoint.
///
/// Sweeps hold a receiver and return as soon as it fires. Request handling
/// never listens here; requests always run to completion.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    fired: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            fired: AtomicBool::new(false),
        }
    }

    /// Receiver handed to a sweep when it is spawned.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal.
    ///
    /// Returns true only for the call that actually fired it; later calls
    /// are no-ops.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        // no receivers just means no sweep was started
        let _ = self.tx.send(());
        true
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
