//! Proxy composition.
//!
//! # Data Flow
//! ```text
//! ProxyConfig
//!     → endpoint.rs (bindings, stores, one dispatcher per port)
//!     → http::server (first path segment → ResourceProxy)
//!     → resource.rs (forward engine, transaction logger, 500 catch-all)
//! ```

pub mod endpoint;
pub mod resource;

pub use endpoint::{EndpointError, ProxyEndpoint};
pub use resource::ResourceProxy;
