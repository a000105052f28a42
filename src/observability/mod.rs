//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!     → trace.rs (plain-string diagnostic sink handed to the core)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Request ID flows through request spans
//! - Metrics are cheap and no-ops until a recorder is installed
//! - The migration and log store only see `TraceSink`, never a logging backend

pub mod logging;
pub mod metrics;
pub mod trace;

pub use trace::TraceSink;
