//! Upstream forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → engine.rs (rebuild URL under the upstream base, copy method/body/content-type)
//!     → hyper client, bounded by the resource timeout
//!     → ForwardOutcome (status + content-type + body to relay, and what to log)
//!
//! On failure:
//!     → method.rs (DELETE / PUT+POST / everything else → configured status)
//! ```
//!
//! # Design Decisions
//! - Timeouts and transport errors map to the same per-method status table
//! - Failures building the request are returned as errors; the caller
//!   answers those with 500
//! - No retries: a proxied call happens exactly once

pub mod engine;
pub mod error;
pub mod method;

pub use engine::{upstream_client, upstream_url, ForwardEngine, ForwardOutcome, UpstreamClient};
pub use error::{ForwardError, PrepareError};
pub use method::MethodKind;
