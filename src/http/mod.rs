//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (net::listener)
//!     → server.rs (Axum router, resource chosen by first path segment)
//!     → request.rs (request ID, buffered body)
//!     → proxy::ResourceProxy (forward + log)
//!     → response.rs (relay status, content type, body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, RequestId, X_REQUEST_ID};
pub use server::{build_router, AppState};
