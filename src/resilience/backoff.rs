//! Exponential backoff with jitter, used between migration sweep passes.

use rand::Rng;
use std::time::Duration;

/// Delay before pass `attempt + 1`: `base_ms * 2^(attempt-1)`, capped at
/// `max_ms`, plus up to 10% jitter. Attempt 0 waits nothing.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let Some(exponent) = attempt.checked_sub(1) else {
        return Duration::ZERO;
    };

    let capped = base_ms.saturating_mul(2u64.saturating_pow(exponent)).min(max_ms);
    let jitter = match capped / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    };

    Duration::from_millis(capped + jitter)
}
