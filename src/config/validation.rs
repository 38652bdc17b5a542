//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check URLs and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.ports must list at least one port")]
    NoPorts,

    #[error("listener.ports contains port 0, which would bind a random port")]
    ZeroPort,

    #[error("listener.ports lists port {0} more than once")]
    DuplicatePort(u16),

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("backend.endpoint '{0}' is not a valid http(s) URL")]
    BadEndpoint(String),

    #[error("compat.{field} must not be empty")]
    EmptyCompat { field: &'static str },

    #[error("compat.api_version '{0}' must not contain '.'")]
    DottedVersion(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    BadMetricsAddress(String),
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.ports.is_empty() {
        errors.push(ValidationError::NoPorts);
    }
    let mut seen = HashSet::new();
    for &port in &config.listener.ports {
        if port == 0 {
            errors.push(ValidationError::ZeroPort);
        } else if !seen.insert(port) {
            errors.push(ValidationError::DuplicatePort(port));
        }
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "listener.request_timeout_secs" });
    }
    if config.listener.drain_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue { field: "listener.drain_timeout_ms" });
    }
    if config.backend.timeout_secs == 0 {
        errors.push(ValidationError::ZeroValue { field: "backend.timeout_secs" });
    }
    if config.routes.status_poll_attempts == 0 {
        errors.push(ValidationError::ZeroValue { field: "routes.status_poll_attempts" });
    }

    match Url::parse(&config.backend.endpoint) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ValidationError::BadEndpoint(config.backend.endpoint.clone())),
    }

    if config.compat.target_header.trim().is_empty() {
        errors.push(ValidationError::EmptyCompat { field: "target_header" });
    }
    if config.compat.api_version.trim().is_empty() {
        errors.push(ValidationError::EmptyCompat { field: "api_version" });
    } else if config.compat.api_version.contains('.') {
        // The version is split off at the first '.', so a dotted version can never match.
        errors.push(ValidationError::DottedVersion(config.compat.api_version.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
