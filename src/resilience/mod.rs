//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Transaction log append:
//!     → retries.rs (bounded attempts, fixed delay, failure swallowed by caller)
//!
//! Background migration sweep:
//!     → pass leaves files behind
//!     → backoff.rs (exponential delay with jitter before the next pass)
//! ```
//!
//! # Design Decisions
//! - Nothing here is async-aware; the store runs on blocking threads
//! - Upstream calls are bounded by a timeout only, never retried

pub mod backoff;
pub mod retries;
