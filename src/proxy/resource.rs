//! One proxied resource: forward, log, respond.
//!
//! # Responsibilities
//! - Resolve the content id and buffer the request
//! - Call upstream through the resource's forward engine
//! - Write exactly one transaction log entry per request
//! - Answer failures that happen before the upstream call with 500

use axum::body::Body;
use axum::http::{request::Parts, Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::Instrument;

use crate::config::ResourceBinding;
use crate::content::ContentId;
use crate::forward::{ForwardEngine, ForwardOutcome, PrepareError};
use crate::http::request::{InboundRequest, RequestId};
use crate::http::response;
use crate::observability::metrics;
use crate::transaction::{Exchange, LogEntry, TransactionLogger};

#[derive(Debug)]
pub struct ResourceProxy {
    binding: ResourceBinding,
    engine: ForwardEngine,
    logger: TransactionLogger,
}

impl ResourceProxy {
    pub fn new(binding: ResourceBinding, engine: ForwardEngine, logger: TransactionLogger) -> Self {
        Self {
            binding,
            engine,
            logger,
        }
    }

    pub fn name(&self) -> &str {
        &self.binding.resource_name
    }

    pub fn binding(&self) -> &ResourceBinding {
        &self.binding
    }

    pub fn logger(&self) -> &TransactionLogger {
        &self.logger
    }

    /// Handle one request addressed to this resource.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let request_id = RequestId::from_headers(request.headers());
        let span = tracing::info_span!(
            "proxy",
            request_id = %request_id,
            resource = %self.binding.resource_name,
            method = %request.method(),
            path = %request.uri().path(),
        );
        self.handle_inner(request).instrument(span).await
    }

    async fn handle_inner(&self, request: Request<Body>) -> Response {
        let arrived_at = Utc::now();
        let started = Instant::now();
        let method = request.method().to_string();
        let content_id = ContentId::from_path(request.uri().path()).ok();

        let (parts, body) = request.into_parts();
        match self.proxy(parts, body, arrived_at).await {
            Ok((inbound, content_id, outcome)) => {
                let path_and_query = inbound.path_and_query();
                let exchange = Exchange {
                    time: arrived_at,
                    content_id,
                    method: inbound.method.as_str(),
                    path_and_query: &path_and_query,
                    request_body: &inbound.body,
                    status: outcome.log_status,
                    response_body: &outcome.log_response,
                    elapsed_ms: outcome.elapsed_ms,
                };
                if !self.logger.record(exchange).await {
                    tracing::warn!("Transaction log entry was not fully written");
                }

                metrics::record_request(self.name(), &method, outcome.status.as_u16(), started);
                response::relay(outcome)
            }
            Err(e) => {
                tracing::error!(error = %e, "Exception handling request");
                let entry = LogEntry::request_failure(arrived_at, content_id, &e);
                if !self.logger.write(entry).await {
                    tracing::warn!("Request failure was not fully logged");
                }

                let status = StatusCode::INTERNAL_SERVER_ERROR;
                metrics::record_request(self.name(), &method, status.as_u16(), started);
                response::status_only(status)
            }
        }
    }

    async fn proxy(
        &self,
        parts: Parts,
        body: Body,
        arrived_at: DateTime<Utc>,
    ) -> Result<(InboundRequest, ContentId, ForwardOutcome), PrepareError> {
        let content_id = ContentId::from_path(parts.uri.path())?;
        let inbound = InboundRequest::read(parts, body, arrived_at, self.binding.max_body_bytes).await?;
        let outcome = self.engine.forward(&inbound).await?;
        Ok((inbound, content_id, outcome))
    }
}
