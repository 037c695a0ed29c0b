//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{NonceBackend, PerimeterConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variables that override secrets from the file.
pub const ENV_ENCRYPTION_KEY: &str = "PERIMETER_ENCRYPTION_KEY";
pub const ENV_SESSION_SECRET: &str = "PERIMETER_SESSION_SECRET";
pub const ENV_WEBHOOK_SECRET: &str = "PERIMETER_WEBHOOK_SECRET";
pub const ENV_AUDIT_IP_SECRET: &str = "PERIMETER_AUDIT_IP_SECRET";
pub const ENV_NONCE_STORE_TOKEN: &str = "PERIMETER_NONCE_STORE_TOKEN";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<ConfigError> for crate::Error {
    fn from(e: ConfigError) -> Self {
        crate::Error::Config(e.to_string())
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PerimeterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: PerimeterConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load from `path` if given, otherwise start from defaults. Environment
/// overrides apply either way.
pub fn load_or_default(path: Option<&Path>) -> Result<PerimeterConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let mut config = PerimeterConfig::default();
            apply_env_overrides(&mut config, |name| std::env::var(name).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Overlay secrets supplied through the environment.
///
/// `lookup` is injected so tests do not mutate process state.
pub fn apply_env_overrides<F>(config: &mut PerimeterConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(key) = non_empty(ENV_ENCRYPTION_KEY) {
        config.encryption.key = key;
    }
    if let Some(secret) = non_empty(ENV_SESSION_SECRET) {
        config.session.secret = secret;
    }
    if let Some(secret) = non_empty(ENV_WEBHOOK_SECRET) {
        config.webhook.secret = secret;
    }
    if let Some(secret) = non_empty(ENV_AUDIT_IP_SECRET) {
        config.audit.ip_hash_secret = secret;
    }
    if let Some(token) = non_empty(ENV_NONCE_STORE_TOKEN) {
        if config.webhook.nonce_store.backend == NonceBackend::Rest {
            config.webhook.nonce_store.token = Some(token);
        }
    }
}
