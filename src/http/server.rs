//! Per-port request dispatch.
//!
//! # Responsibilities
//! - Build the Axum router a dispatcher serves on each connection
//! - Pick the resource from the first path segment (case-insensitive)
//! - Count in-flight requests so `stop` can drain them
//! - Run each request on its own task, to completion even if the caller leaves
//!
//! # Design Decisions
//! - Every path goes through a single fallback handler; no Axum routes
//! - An unknown first segment is answered with 404 and not logged

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::http::response;
use crate::net::connection::InFlightTracker;
use crate::proxy::ResourceProxy;

/// Application state injected into the dispatch handler.
#[derive(Clone)]
pub struct AppState {
    /// Resources served on this port, keyed by lowercase name.
    pub resources: Arc<HashMap<String, Arc<ResourceProxy>>>,
    pub in_flight: InFlightTracker,
}

impl AppState {
    pub fn new(resources: impl IntoIterator<Item = Arc<ResourceProxy>>, in_flight: InFlightTracker) -> Self {
        let resources = resources
            .into_iter()
            .map(|proxy| (proxy.name().to_ascii_lowercase(), proxy))
            .collect();
        Self {
            resources: Arc::new(resources),
            in_flight,
        }
    }

    /// The resource whose prefix `path` falls under.
    pub fn resolve(&self, path: &str) -> Option<&Arc<ResourceProxy>> {
        let segment = first_segment(path)?;
        self.resources.get(&segment.to_ascii_lowercase())
    }
}

/// First non-empty path segment.
pub fn first_segment(path: &str) -> Option<&str> {
    path.split('/').find(|s| !s.is_empty())
}

/// Build the router for one listening port.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some(proxy) = state.resolve(request.uri().path()).cloned() else {
        tracing::debug!(path = %request.uri().path(), "No resource bound to path");
        return response::no_such_resource();
    };

    // Detached from the connection: the guard drops when the work ends,
    // not when the caller hangs up.
    let guard = state.in_flight.track();
    let resource = proxy.name().to_string();
    let work = tokio::spawn(async move {
        let _guard = guard;
        proxy.handle(request).await
    });

    match work.await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(resource = %resource, error = %e, "Request task failed");
            response::status_only(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
