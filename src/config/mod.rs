//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → binding.rs (one ResourceBinding per resource, defaults applied)
//!     → handed to the proxy endpoint at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod binding;
pub mod loader;
pub mod schema;
pub mod validation;

pub use binding::{ResourceBinding, TimeoutStatuses};
pub use loader::{load_config, ConfigError};
pub use schema::ProxyConfig;
pub use schema::ListenerConfig;
pub use schema::ResourceConfig;
pub use schema::SharedLogMode;
