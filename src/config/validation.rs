//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check resource names are usable as path segments and unique
//! - Validate upstream URLs and status-code overrides
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use axum::http::StatusCode;
use url::Url;

use crate::config::schema::ProxyConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no resources configured")]
    NoResources,
    #[error("resource name {0:?} must be a single non-empty path segment")]
    InvalidResourceName(String),
    #[error("resource {0:?} is configured more than once")]
    DuplicateResource(String),
    #[error("resource {resource:?} has invalid upstream {upstream:?}: {reason}")]
    InvalidUpstream { resource: String, upstream: String, reason: String },
    #[error("{scope}: {code} is not a valid HTTP status code")]
    InvalidStatusCode { scope: String, code: u16 },
    #[error("{0}: timeout must be greater than zero")]
    ZeroTimeout(String),
    #[error("transaction_log.max_body_chars must be greater than zero")]
    ZeroBodyChars,
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.resources.is_empty() {
        errors.push(ValidationError::NoResources);
    }

    check_timeout(&mut errors, "upstream", Some(config.upstream.timeout_secs));
    check_status(&mut errors, "upstream.status_on_get_timeout", Some(config.upstream.status_on_get_timeout));
    check_status(&mut errors, "upstream.status_on_put_post_timeout", Some(config.upstream.status_on_put_post_timeout));
    check_status(&mut errors, "upstream.status_on_delete_timeout", Some(config.upstream.status_on_delete_timeout));

    if config.transaction_log.max_body_chars == 0 {
        errors.push(ValidationError::ZeroBodyChars);
    }

    let mut seen = HashSet::new();
    for resource in &config.resources {
        let name = &resource.name;
        if name.is_empty() || name.contains(['/', '\\', '?', '#']) || name == "." || name == ".." {
            errors.push(ValidationError::InvalidResourceName(name.clone()));
        }
        // prefixes match case-insensitively
        if !seen.insert(name.to_lowercase()) {
            errors.push(ValidationError::DuplicateResource(name.clone()));
        }

        match Url::parse(&resource.upstream) {
            Ok(url) if url.scheme() != "http" => errors.push(ValidationError::InvalidUpstream {
                resource: name.clone(),
                upstream: resource.upstream.clone(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidUpstream {
                resource: name.clone(),
                upstream: resource.upstream.clone(),
                reason: e.to_string(),
            }),
        }

        check_timeout(&mut errors, name, resource.timeout_secs);
        check_status(&mut errors, name, resource.status_on_get_timeout);
        check_status(&mut errors, name, resource.status_on_put_post_timeout);
        check_status(&mut errors, name, resource.status_on_delete_timeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_timeout(errors: &mut Vec<ValidationError>, scope: &str, secs: Option<u64>) {
    if secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout(scope.to_string()));
    }
}

fn check_status(errors: &mut Vec<ValidationError>, scope: &str, code: Option<u16>) {
    if let Some(code) = code {
        if StatusCode::from_u16(code).is_err() {
            errors.push(ValidationError::InvalidStatusCode { scope: scope.to_string(), code });
        }
    }
}
