//! HTTP method classification.

use axum::http::{Method, StatusCode};

use crate::config::TimeoutStatuses;

/// Methods the proxy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Get,
    Put,
    Post,
    Delete,
    Head,
    Trace,
    Options,
    Other,
}

impl From<&Method> for MethodKind {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => MethodKind::Get,
            Method::PUT => MethodKind::Put,
            Method::POST => MethodKind::Post,
            Method::DELETE => MethodKind::Delete,
            Method::HEAD => MethodKind::Head,
            Method::TRACE => MethodKind::Trace,
            Method::OPTIONS => MethodKind::Options,
            _ => MethodKind::Other,
        }
    }
}

impl MethodKind {
    /// Status returned to the caller when the upstream call fails.
    pub fn timeout_status(self, statuses: &TimeoutStatuses) -> StatusCode {
        match self {
            MethodKind::Delete => statuses.delete,
            MethodKind::Put | MethodKind::Post => statuses.put_post,
            _ => statuses.get,
        }
    }
}
