//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use logging_proxy::config::{ProxyConfig, ResourceConfig};
use logging_proxy::ProxyEndpoint;

/// What a mock backend saw.
#[derive(Debug, Clone, Default)]
pub struct ReceivedRequest {
    pub method: String,
    pub target: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// A canned backend reply.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn ok(content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            status: 200,
            content_type: None,
            body: "late".into(),
            delay,
        }
    }
}

/// Raw-TCP backend on an ephemeral port. Every request gets `reply`.
pub async fn start_mock_backend(reply: MockReply) -> (SocketAddr, Arc<Mutex<Vec<ReceivedRequest>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let reply = reply.clone();
                    let log = log.clone();
                    tokio::spawn(async move {
                        serve_one(socket, reply, log).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, seen)
}

async fn serve_one(mut socket: TcpStream, reply: MockReply, log: Arc<Mutex<Vec<ReceivedRequest>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let mut received = ReceivedRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        target: request_line.next().unwrap_or_default().to_string(),
        ..ReceivedRequest::default()
    };

    let mut content_length = 0;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("content-type") {
                received.content_type = Some(value.to_string());
            }
        }
    }

    while buf.len() < header_end + content_length {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let body_end = buf.len().min(header_end + content_length);
    received.body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();
    log.lock().unwrap().push(received);

    tokio::time::sleep(reply.delay).await;

    let reason = axum::http::StatusCode::from_u16(reply.status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown");
    let mut response = format!("HTTP/1.1 {} {}\r\n", reply.status, reason);
    if let Some(content_type) = reply.content_type {
        response.push_str(&format!("Content-Type: {}\r\n", content_type));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.body.len(),
        reply.body
    ));
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Config listening on an ephemeral loopback port, logging under `root`.
pub fn proxy_config(root: &Path, resources: Vec<ResourceConfig>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.log_root = root.to_path_buf();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.migration.base_delay_ms = 10;
    config.migration.max_delay_ms = 50;
    config.shutdown.drain_timeout_secs = 5;
    config.resources = resources;
    config
}

/// Build and start an endpoint; returns it with its first bound address.
pub async fn start_proxy(config: ProxyConfig) -> (ProxyEndpoint, SocketAddr) {
    let endpoint = ProxyEndpoint::new(config).unwrap();
    let addrs = endpoint.start().await.unwrap();
    (endpoint, addrs[0])
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Lines of a log file, or none if it doesn't exist.
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
