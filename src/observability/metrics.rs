//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, log write failures, migrations)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by resource, method, status
//! - `proxy_request_duration_seconds` (histogram): latency by resource
//! - `proxy_accepted_connections_total` (counter): accepted connections by port
//! - `proxy_log_write_failures_total` (counter): appends dropped after retries
//! - `proxy_migrated_files_total` (counter): legacy files moved into shards

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP listener.
/// Must be called from inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(resource: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "resource" => resource.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "resource" => resource.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_accepted(port: u16) {
    counter!("proxy_accepted_connections_total", "port" => port.to_string()).increment(1);
}

pub fn record_log_write_failure(resource: &str) {
    counter!("proxy_log_write_failures_total", "resource" => resource.to_string()).increment(1);
}

pub fn record_migrated(resource: &str) {
    counter!("proxy_migrated_files_total", "resource" => resource.to_string()).increment(1);
}
