//! Transaction logging subsystem.
//!
//! # Data Flow
//! ```text
//! Forward outcome (or request-handling failure)
//!     → record.rs (sanitize bodies, build the tab-separated line)
//!     → logger.rs (hop to a blocking thread)
//!     → content::store (per-content file + shared file)
//! ```
//!
//! # Design Decisions
//! - One line per transaction; tabs and newlines never leak from bodies
//! - Logging is best-effort: it never changes the response

pub mod logger;
pub mod record;

pub use logger::TransactionLogger;
pub use record::{Exchange, LogEntry, LogRecord, StatusLabel};
