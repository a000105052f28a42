//! Plain-string diagnostic sink.
//!
//! The content store and the migration sweep report through a `TraceSink`
//! rather than calling `tracing` directly, so a host can route those lines
//! wherever it likes.

use std::fmt;
use std::sync::Arc;

/// Cloneable `trace(message)` callback.
#[derive(Clone)]
pub struct TraceSink {
    inner: Arc<dyn Fn(&str) + Send + Sync>,
}

impl TraceSink {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Forward every line to `tracing::debug!`, tagged with the resource.
    pub fn tracing(resource: impl Into<String>) -> Self {
        let resource = resource.into();
        Self::new(move |msg| tracing::debug!(resource = %resource, "{}", msg))
    }

    /// Discard everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn trace(&self, message: &str) {
        (self.inner)(message)
    }
}

impl fmt::Debug for TraceSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TraceSink")
    }
}
