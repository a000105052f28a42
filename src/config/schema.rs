//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the logging proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Directory holding one log root per resource.
    pub log_root: PathBuf,

    /// Listener configuration (bind host, default port).
    pub listener: ListenerConfig,

    /// Upstream call settings shared by all resources.
    pub upstream: UpstreamConfig,

    /// Transaction log file settings.
    pub transaction_log: TransactionLogConfig,

    /// Legacy flat-file migration settings.
    pub migration: MigrationConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Proxied resources, one listen prefix each.
    pub resources: Vec<ResourceConfig>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            log_root: PathBuf::from("logs"),
            listener: ListenerConfig::default(),
            upstream: UpstreamConfig::default(),
            transaction_log: TransactionLogConfig::default(),
            migration: MigrationConfig::default(),
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
            resources: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind host. `0.0.0.0` plays the role of the `+` wildcard.
    pub host: String,

    /// Port used by resources that don't name their own.
    pub port: u16,

    /// Allow more than one request per connection.
    pub keep_alive: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            keep_alive: true,
        }
    }
}

/// Upstream call configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Bound on the whole upstream exchange, body transfer included.
    pub timeout_secs: u64,

    /// Status returned to the caller when a GET (or any other method not
    /// listed below) fails upstream.
    pub status_on_get_timeout: u16,

    /// Status returned when a PUT or POST fails upstream.
    pub status_on_put_post_timeout: u16,

    /// Status returned when a DELETE fails upstream.
    pub status_on_delete_timeout: u16,

    /// Largest request or response body buffered, in bytes.
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            status_on_get_timeout: 503,
            status_on_put_post_timeout: 503,
            status_on_delete_timeout: 503,
            max_body_bytes: 10_000_000,
        }
    }
}

/// Secondary file every transaction line is also written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SharedLogMode {
    /// `<resource>_yyyyMMdd.log` in the resource's log root.
    #[default]
    Daily,
    /// `<resource>.log` in the resource's log root.
    Flat,
    /// Per-content files only.
    None,
}

/// Transaction log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionLogConfig {
    pub shared_log: SharedLogMode,

    /// Extra attempts for a failed append.
    pub write_retries: u32,

    /// Pause between append attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Body text is truncated to this many characters.
    pub max_body_chars: usize,
}

impl Default for TransactionLogConfig {
    fn default() -> Self {
        Self {
            shared_log: SharedLogMode::Daily,
            write_retries: 3,
            retry_delay_ms: 25,
            max_body_chars: 1000,
        }
    }
}

/// Background migration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Run the sweep at startup.
    pub enabled: bool,

    /// Base delay between passes that left files behind.
    pub base_delay_ms: u64,

    /// Cap on the delay between passes.
    pub max_delay_ms: u64,

    /// Passes attempted before the sweep gives up.
    pub max_passes: u32,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_delay_ms: 250,
            max_delay_ms: 30_000,
            max_passes: 20,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long `stop` waits for in-flight requests.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One proxied resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceConfig {
    /// Path segment the resource listens under.
    pub name: String,

    /// Base URL the rest of the path is appended to.
    pub upstream: String,

    /// Log root for this resource (default: `<log_root>/<name>`).
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Listen port (default: `listener.port`).
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub status_on_get_timeout: Option<u16>,

    #[serde(default)]
    pub status_on_put_post_timeout: Option<u16>,

    #[serde(default)]
    pub status_on_delete_timeout: Option<u16>,
}

impl ResourceConfig {
    /// A resource using every default.
    pub fn new(name: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upstream: upstream.into(),
            log_path: None,
            port: None,
            timeout_secs: None,
            status_on_get_timeout: None,
            status_on_put_post_timeout: None,
            status_on_delete_timeout: None,
        }
    }
}
