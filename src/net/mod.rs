//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, one task per connection)
//!     → hyper HTTP/1.1 connection serving the port's router
//!     → connection.rs (connection IDs, in-flight request count)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - One dispatcher per port; resources sharing a port share it
//! - Stopping closes the listen socket first, then lets connections finish
//!   their current request

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, InFlightTracker};
pub use listener::{Dispatcher, DispatcherState, ListenerError};
