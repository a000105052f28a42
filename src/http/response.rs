//! Response construction.
//!
//! # Responsibilities
//! - Relay upstream status, content type and body to the caller
//! - Build bare status responses for failures
//!
//! # Design Decisions
//! - Failure responses carry no body; the status is the only signal
//! - Content-Length comes from the buffered body

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::forward::ForwardOutcome;

/// The caller's view of a forward outcome.
pub fn relay(outcome: ForwardOutcome) -> Response {
    let mut response = Response::new(Body::from(outcome.body));
    *response.status_mut() = outcome.status;
    if let Some(content_type) = outcome.content_type {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

pub fn status_only(status: StatusCode) -> Response {
    status.into_response()
}

/// No resource is bound to the request's first path segment.
pub fn no_such_resource() -> Response {
    status_only(StatusCode::NOT_FOUND)
}
