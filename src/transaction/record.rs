//! Log record construction.
//!
//! Line layout, tab separated:
//! ```text
//! timestamp  contentId  method  path+query  requestBody  statusLabel  responseBody  <elapsed>ms
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

use crate::content::ContentId;

pub const NOT_AVAILABLE: &str = "n/a";
pub const HTML_PREFIX: &str = "<html>";
pub const HTML_COLLAPSED: &str = "<html>...";
pub const TIMEOUT_MESSAGE: &str = "The operation has timed out";
pub const DEFAULT_MAX_BODY_CHARS: usize = 1000;

const FIELD_BREAKERS: [char; 3] = ['\r', '\t', '\n'];

/// Outcome column of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    /// Upstream answered with this status.
    Http(u16),
    /// The upstream call failed or timed out.
    Exception,
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLabel::Http(code) => write!(f, "HTTP {}", code),
            StatusLabel::Exception => f.write_str("Exception"),
        }
    }
}

/// Replace every CR, TAB and LF with a space.
pub fn sanitize(text: &str) -> String {
    text.replace(FIELD_BREAKERS, " ")
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    }
}

fn body_text(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        None
    } else {
        Some(sanitize(&text))
    }
}

/// Request body as it appears in the log.
pub fn format_request_body(bytes: &[u8], max_chars: usize) -> String {
    match body_text(bytes) {
        Some(text) => truncate_chars(text, max_chars),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Response body (or failure message) as it appears in the log.
pub fn format_response_body(bytes: &[u8], max_chars: usize) -> String {
    match body_text(bytes) {
        Some(text) if text.starts_with(HTML_PREFIX) => HTML_COLLAPSED.to_string(),
        Some(text) => truncate_chars(text, max_chars),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Raw inputs of one request/response exchange.
#[derive(Debug, Clone)]
pub struct Exchange<'a> {
    pub time: DateTime<Utc>,
    pub content_id: ContentId,
    pub method: &'a str,
    pub path_and_query: &'a str,
    pub request_body: &'a [u8],
    pub status: StatusLabel,
    pub response_body: &'a [u8],
    pub elapsed_ms: u64,
}

/// A transaction, formatted and ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub time: DateTime<Utc>,
    pub content_id: ContentId,
    pub method: String,
    pub path_and_query: String,
    pub request_body: String,
    pub status: StatusLabel,
    pub response_body: String,
    pub elapsed_ms: u64,
}

impl LogRecord {
    pub fn from_exchange(exchange: Exchange<'_>, max_body_chars: usize) -> Self {
        Self {
            time: exchange.time,
            content_id: exchange.content_id,
            method: exchange.method.to_string(),
            path_and_query: sanitize(exchange.path_and_query),
            request_body: format_request_body(exchange.request_body, max_body_chars),
            status: exchange.status,
            response_body: format_response_body(exchange.response_body, max_body_chars),
            elapsed_ms: exchange.elapsed_ms,
        }
    }

    /// The record without its timestamp.
    pub fn line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}ms",
            self.content_id,
            self.method,
            self.path_and_query,
            self.request_body,
            self.status,
            self.response_body,
            self.elapsed_ms
        )
    }
}

/// Anything the transaction logger writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Transaction(LogRecord),
    /// The request failed before an upstream exchange happened.
    RequestFailure {
        time: DateTime<Utc>,
        content_id: Option<ContentId>,
        message: String,
    },
}

impl LogEntry {
    pub fn request_failure(
        time: DateTime<Utc>,
        content_id: Option<ContentId>,
        error: &dyn fmt::Display,
    ) -> Self {
        LogEntry::RequestFailure {
            time,
            content_id,
            message: sanitize(&format!("Exception handling request: {}", error)),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Transaction(record) => record.time,
            LogEntry::RequestFailure { time, .. } => *time,
        }
    }

    pub fn content_id(&self) -> Option<&ContentId> {
        match self {
            LogEntry::Transaction(record) => Some(&record.content_id),
            LogEntry::RequestFailure { content_id, .. } => content_id.as_ref(),
        }
    }

    /// The persisted line: timestamp, tab, record.
    pub fn timed_line(&self) -> String {
        let body = match self {
            LogEntry::Transaction(record) => record.line(),
            LogEntry::RequestFailure { message, .. } => message.clone(),
        };
        format!("{}\t{}", format_timestamp(self.time()), body)
    }
}
