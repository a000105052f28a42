//! Resolved per-resource settings.
//!
//! A `ResourceBinding` is what the rest of the proxy sees of configuration:
//! one resource with every default and override already applied.

use axum::http::StatusCode;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::schema::{ProxyConfig, ResourceConfig, SharedLogMode};
use crate::resilience::retries::RetryPolicy;

/// Caller-visible status codes used when an upstream call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutStatuses {
    pub get: StatusCode,
    pub put_post: StatusCode,
    pub delete: StatusCode,
}

impl Default for TimeoutStatuses {
    fn default() -> Self {
        Self {
            get: StatusCode::SERVICE_UNAVAILABLE,
            put_post: StatusCode::SERVICE_UNAVAILABLE,
            delete: StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Immutable settings for one proxied resource.
#[derive(Debug, Clone)]
pub struct ResourceBinding {
    pub listen_host: String,
    pub listen_port: u16,
    pub resource_name: String,
    pub upstream_base_url: String,
    pub log_root: PathBuf,
    pub timeout: Duration,
    pub timeout_statuses: TimeoutStatuses,
    pub max_body_bytes: usize,
    pub keep_alive: bool,
    pub shared_log: SharedLogMode,
    pub write_retry: RetryPolicy,
    pub max_body_chars: usize,
}

impl ResourceBinding {
    /// Resolve `resource` against the global sections of `config`.
    ///
    /// Invalid status codes fall back to 503; `validate_config` rejects them
    /// before this is reached in the binary.
    pub fn from_config(config: &ProxyConfig, resource: &ResourceConfig) -> Self {
        let upstream = &config.upstream;
        let status = |code: Option<u16>, default: u16| {
            StatusCode::from_u16(code.unwrap_or(default)).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
        };

        Self {
            listen_host: config.listener.host.clone(),
            listen_port: resource.port.unwrap_or(config.listener.port),
            resource_name: resource.name.clone(),
            upstream_base_url: resource.upstream.clone(),
            log_root: resource
                .log_path
                .clone()
                .unwrap_or_else(|| config.log_root.join(&resource.name)),
            timeout: Duration::from_secs(resource.timeout_secs.unwrap_or(upstream.timeout_secs)),
            timeout_statuses: TimeoutStatuses {
                get: status(resource.status_on_get_timeout, upstream.status_on_get_timeout),
                put_post: status(resource.status_on_put_post_timeout, upstream.status_on_put_post_timeout),
                delete: status(resource.status_on_delete_timeout, upstream.status_on_delete_timeout),
            },
            max_body_bytes: upstream.max_body_bytes,
            keep_alive: config.listener.keep_alive,
            shared_log: config.transaction_log.shared_log,
            write_retry: RetryPolicy::new(
                config.transaction_log.write_retries,
                Duration::from_millis(config.transaction_log.retry_delay_ms),
            ),
            max_body_chars: config.transaction_log.max_body_chars,
        }
    }

    /// Every resource of `config`, resolved.
    pub fn all_from_config(config: &ProxyConfig) -> Vec<Self> {
        config
            .resources
            .iter()
            .map(|resource| Self::from_config(config, resource))
            .collect()
    }

    /// The listen prefix, written the way the wildcard listener reports it.
    pub fn prefix(&self) -> String {
        format!("http://+:{}/{}/", self.listen_port, self.resource_name)
    }
}
