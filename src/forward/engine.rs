//! Forward engine.
//!
//! # Responsibilities
//! - Rebuild the upstream URL from the inbound path
//! - Issue the upstream call with the inbound method, body and content type
//! - Bound the whole exchange (headers and body) by the resource timeout
//! - Map failures to the per-method status table
//!
//! # Design Decisions
//! - Only `content-type` crosses the proxy in either direction
//! - Response bodies are buffered so they can be logged and relayed

use axum::body::{Body, Bytes};
use axum::http::{header::CONTENT_TYPE, HeaderValue, Request, StatusCode, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::{Duration, Instant};

use crate::config::{ResourceBinding, TimeoutStatuses};
use crate::forward::error::{ForwardError, PrepareError};
use crate::forward::method::MethodKind;
use crate::http::request::InboundRequest;
use crate::transaction::record::StatusLabel;

pub type UpstreamClient = Client<HttpConnector, Body>;

/// Build the shared upstream client.
pub fn upstream_client() -> UpstreamClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// `base` followed by everything after `/<resource>/` in `path`, then the query.
pub fn upstream_url(base: &str, path: &str, query: Option<&str>) -> String {
    let without_root = path.strip_prefix('/').unwrap_or(path);
    let rest = without_root.split_once('/').map(|(_, rest)| rest).unwrap_or("");

    let mut url = String::with_capacity(base.len() + rest.len() + 1);
    url.push_str(base);
    url.push_str(rest);
    if let Some(query) = query {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// What the caller gets back, and what goes in the transaction log.
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
    pub elapsed_ms: u64,
    pub log_status: StatusLabel,
    /// Upstream body, or the failure message.
    pub log_response: Bytes,
}

/// Calls one resource's upstream.
#[derive(Debug, Clone)]
pub struct ForwardEngine {
    client: UpstreamClient,
    resource: String,
    base_url: String,
    timeout: Duration,
    statuses: TimeoutStatuses,
    max_body_bytes: usize,
}

impl ForwardEngine {
    pub fn new(binding: &ResourceBinding, client: UpstreamClient) -> Self {
        Self {
            client,
            resource: binding.resource_name.clone(),
            base_url: binding.upstream_base_url.clone(),
            timeout: binding.timeout,
            statuses: binding.timeout_statuses,
            max_body_bytes: binding.max_body_bytes,
        }
    }

    /// Forward `inbound` upstream.
    ///
    /// Upstream failures are folded into the outcome; only problems
    /// building the outbound request are returned as errors.
    pub async fn forward(&self, inbound: &InboundRequest) -> Result<ForwardOutcome, PrepareError> {
        let url = upstream_url(&self.base_url, &inbound.path, inbound.query.as_deref());
        let uri: Uri = url.parse().map_err(|source| PrepareError::UpstreamUrl {
            url: url.clone(),
            source,
        })?;

        let mut builder = Request::builder().method(inbound.method.clone()).uri(uri);
        let body = if inbound.has_body {
            if let Some(content_type) = inbound.headers.get(CONTENT_TYPE) {
                builder = builder.header(CONTENT_TYPE, content_type.clone());
            }
            Body::from(inbound.body.clone())
        } else {
            Body::empty()
        };
        let request = builder.body(body)?;

        tracing::debug!(
            resource = %self.resource,
            method = %inbound.method,
            url = %url,
            "Calling upstream"
        );

        let timer = Instant::now();
        let result = self.call(request).await;
        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome = match result {
            Ok((status, content_type, body)) => ForwardOutcome {
                status,
                content_type,
                log_status: StatusLabel::Http(status.as_u16()),
                log_response: body.clone(),
                body,
                elapsed_ms,
            },
            Err(e) => {
                let status = MethodKind::from(&inbound.method).timeout_status(&self.statuses);
                tracing::warn!(
                    resource = %self.resource,
                    method = %inbound.method,
                    url = %url,
                    status = status.as_u16(),
                    elapsed_ms,
                    error = %e,
                    "Upstream call failed"
                );
                ForwardOutcome {
                    status,
                    content_type: None,
                    body: Bytes::new(),
                    elapsed_ms,
                    log_status: StatusLabel::Exception,
                    log_response: Bytes::from(e.to_string()),
                }
            }
        };
        Ok(outcome)
    }

    async fn call(
        &self,
        request: Request<Body>,
    ) -> Result<(StatusCode, Option<HeaderValue>, Bytes), ForwardError> {
        let exchange = async {
            let response = self.client.request(request).await.map_err(ForwardError::Upstream)?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
                .await
                .map_err(ForwardError::ResponseBody)?;
            Ok((parts.status, parts.headers.get(CONTENT_TYPE).cloned(), bytes))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ForwardError::Timeout)?
    }
}
