//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals and timeouts > 0)
//! - Reject duplicate or empty namespaces
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the client

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("app.app_id must not be empty")]
    EmptyAppId,

    #[error("app.cluster must not be empty")]
    EmptyCluster,

    #[error("app.config_server_url is not a valid http(s) URL: {0}")]
    InvalidServerUrl(String),

    #[error("at least one namespace must be configured")]
    NoNamespaces,

    #[error("namespace names must not be empty")]
    EmptyNamespace,

    #[error("namespace {0:?} is configured more than once")]
    DuplicateNamespace(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.app.app_id.trim().is_empty() {
        errors.push(ValidationError::EmptyAppId);
    }
    if config.app.cluster.trim().is_empty() {
        errors.push(ValidationError::EmptyCluster);
    }
    match Url::parse(&config.app.config_server_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ValidationError::InvalidServerUrl(
            config.app.config_server_url.clone(),
        )),
    }

    if config.namespaces.is_empty() {
        errors.push(ValidationError::NoNamespaces);
    }
    let mut seen = HashSet::new();
    for namespace in &config.namespaces {
        if namespace.trim().is_empty() {
            errors.push(ValidationError::EmptyNamespace);
        } else if !seen.insert(namespace.as_str()) {
            errors.push(ValidationError::DuplicateNamespace(namespace.clone()));
        }
    }

    if config.sync.interval_ms == 0 {
        errors.push(ValidationError::ZeroValue("sync.interval_ms"));
    }
    if config.sync.fetch_timeout_ms == 0 {
        errors.push(ValidationError::ZeroValue("sync.fetch_timeout_ms"));
    }
    if config.sync.failure_threshold == 0 {
        errors.push(ValidationError::ZeroValue("sync.failure_threshold"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
