//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate or adopt a request ID for tracing
//! - Buffer the inbound body when the request declares one
//! - Keep the pieces the forward engine and the logger need
//!
//! # Design Decisions
//! - The request ID only labels spans; it isn't forwarded or persisted
//! - A body that exceeds the limit fails the request before any upstream call

use axum::body::{Body, Bytes};
use axum::http::{
    header::{CONTENT_LENGTH, TRANSFER_ENCODING},
    request::Parts,
    HeaderMap, Method,
};
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::forward::PrepareError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlates the diagnostic lines of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Adopt the caller's `x-request-id`, or make one up.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when the headers announce a non-empty entity body.
pub fn declares_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0)
}

/// A request as received, body buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub has_body: bool,
    pub body: Bytes,
    pub arrived_at: DateTime<Utc>,
}

impl InboundRequest {
    /// Buffer `body` (up to `max_body_bytes`) if the request declares one.
    pub async fn read(
        parts: Parts,
        body: Body,
        arrived_at: DateTime<Utc>,
        max_body_bytes: usize,
    ) -> Result<Self, PrepareError> {
        let has_body = declares_body(&parts.headers);
        let body = if has_body {
            axum::body::to_bytes(body, max_body_bytes)
                .await
                .map_err(PrepareError::RequestBody)?
        } else {
            Bytes::new()
        };

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            has_body,
            body,
            arrived_at,
        })
    }

    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}
