//! Bounded retry for blocking operations.
//!
//! # Responsibilities
//! - Re-run a fallible blocking closure a fixed number of extra times
//! - Sleep a fixed delay between attempts
//! - Hand the last error back so the caller decides whether to swallow it
//!
//! # Design Decisions
//! - Fixed delay, no jitter
//! - Must only be called from a blocking context (uses `std::thread::sleep`)

use std::time::Duration;

/// Retry budget for a single blocking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Pause between two attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Total attempts, first one included.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(25),
        }
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// Returns the last error when every attempt failed.
pub fn retry_blocking<T, E, F>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= policy.attempts() => return Err(e),
            Err(_) => {
                attempt += 1;
                std::thread::sleep(policy.delay);
            }
        }
    }
}
