//! Transparent logging reverse proxy.
//!
//! Each configured resource listens under `/<resource>/` and forwards to an
//! upstream base URL. Every exchange is written as one tab-separated line to
//! a per-content log file (sharded by content id) and to a shared log.

pub mod config;
pub mod content;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod transaction;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use observability::TraceSink;
pub use proxy::{EndpointError, ProxyEndpoint};
