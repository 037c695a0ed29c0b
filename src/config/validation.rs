//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Reject malformed secrets before any request is served
//! - Validate value ranges (tolerance > 0, retention > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PerimeterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{NonceBackend, PerimeterConfig};
use crate::crypto::FieldKey;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PerimeterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a socket address like 0.0.0.0:8080",
        ));
    }

    match url::Url::parse(&config.app.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::new(
            "app.url",
            "must be an absolute http(s) URL",
        )),
    }

    if let Err(e) = FieldKey::parse(&config.encryption.key) {
        errors.push(ValidationError::new("encryption.key", e.to_string()));
    }

    if config.session.secret.is_empty() {
        errors.push(ValidationError::new("session.secret", "must not be empty"));
    }

    if config.webhook.secret.is_empty() {
        errors.push(ValidationError::new("webhook.secret", "must not be empty"));
    }
    if config.webhook.tolerance_secs == 0 {
        errors.push(ValidationError::new(
            "webhook.tolerance_secs",
            "must be greater than zero",
        ));
    }
    if config.webhook.nonce_store.backend == NonceBackend::Rest {
        let valid = config
            .webhook
            .nonce_store
            .url
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok())
            .is_some();
        if !valid {
            errors.push(ValidationError::new(
                "webhook.nonce_store.url",
                "rest backend requires a valid url",
            ));
        }
    }

    if config.audit.ip_hash_secret.is_empty() {
        errors.push(ValidationError::new("audit.ip_hash_secret", "must not be empty"));
    }
    if config.audit.retention_days == 0 {
        errors.push(ValidationError::new(
            "audit.retention_days",
            "must be greater than zero",
        ));
    }
    if !(8..=64).contains(&config.audit.ip_hash_len) {
        errors.push(ValidationError::new(
            "audit.ip_hash_len",
            "must be between 8 and 64",
        ));
    }
    if config.audit.queue_capacity == 0 {
        errors.push(ValidationError::new(
            "audit.queue_capacity",
            "must be greater than zero",
        ));
    }

    if !config.csrf.protected_prefix.starts_with('/') {
        errors.push(ValidationError::new(
            "csrf.protected_prefix",
            "must start with '/'",
        ));
    }
    if config.admin.path_prefixes.iter().any(|p| !p.starts_with('/')) {
        errors.push(ValidationError::new(
            "admin.path_prefixes",
            "every prefix must start with '/'",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
