//! Content identifier extraction.
//!
//! The content id is the last path segment, except that a trailing `Status`
//! segment (any case) defers to the segment before it, so `/r/42/Status`
//! logs against the same file as `/r/42`.

use std::fmt;

const STATUS_SEGMENT: &str = "Status";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentIdError {
    #[error("request path {0:?} has no content segment")]
    Missing(String),
    #[error("content id {0:?} is not usable as a file name")]
    Invalid(String),
}

/// Key of a per-content log file. Never empty, never a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContentIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ContentIdError::Missing(id));
        }
        if id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
            return Err(ContentIdError::Invalid(id));
        }
        Ok(Self(id))
    }

    /// Extract the content id from a request path (query excluded).
    pub fn from_path(path: &str) -> Result<Self, ContentIdError> {
        let mut segments = path.split('/').filter(|s| !s.is_empty()).rev();
        let last = segments.next().ok_or_else(|| ContentIdError::Missing(path.to_string()))?;

        if last.eq_ignore_ascii_case(STATUS_SEGMENT) {
            let parent = segments.next().ok_or_else(|| ContentIdError::Missing(path.to_string()))?;
            return Self::new(parent);
        }
        Self::new(last)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
