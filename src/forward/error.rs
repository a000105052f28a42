//! Forwarding errors.

use axum::http::uri::InvalidUri;
use std::error::Error;

use crate::content::ContentIdError;
use crate::transaction::record::TIMEOUT_MESSAGE;

/// The upstream exchange failed. Mapped to a status, never returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,
    #[error("{}", error_chain(.0))]
    Upstream(hyper_util::client::legacy::Error),
    #[error("failed to read upstream response: {0}")]
    ResponseBody(axum::Error),
}

/// The request could not be handled far enough to call upstream.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error(transparent)]
    ContentId(#[from] ContentIdError),
    #[error("failed to read request body: {0}")]
    RequestBody(axum::Error),
    #[error("invalid upstream URL {url:?}: {source}")]
    UpstreamUrl {
        url: String,
        #[source]
        source: InvalidUri,
    },
    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),
}

/// Display an error followed by its sources, `outer: inner: root`.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}
