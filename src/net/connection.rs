//! Connection identity and in-flight request tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count requests that are still being handled
//! - Let shutdown wait, with a bound, for that count to reach zero

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Relaxed ordering is enough; only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicU64,
    idle: Notify,
}

/// Counts in-flight requests across every dispatcher of an endpoint.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    inner: Arc<TrackerInner>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request. The returned guard releases it on drop.
    pub fn track(&self) -> InFlightGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn active(&self) -> u64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Wait until no request is in flight. False if `timeout` ran out first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // register before checking so a release in between isn't missed
            notified.as_mut().enable();

            if self.active() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.active() == 0;
            }
        }
    }
}

/// Held for the lifetime of one request.
#[derive(Debug)]
pub struct InFlightGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
