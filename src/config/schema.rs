//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the perimeter.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the security perimeter.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PerimeterConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Canonical application identity.
    pub app: AppConfig,

    /// Double-submit cookie and origin checks.
    pub csrf: CsrfConfig,

    /// Session cookie verification.
    pub session: SessionConfig,

    /// Admin identities and admin-only paths.
    pub admin: AdminConfig,

    /// Field-level encryption key.
    pub encryption: EncryptionConfig,

    /// Webhook signature and replay protection.
    pub webhook: WebhookConfig,

    /// Untrusted-file quarantine.
    pub quarantine: QuarantineConfig,

    /// Audit log sanitization and retention.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 16 * 1024 * 1024,
            request_timeout_secs: 30,
        }
    }
}

/// Canonical application identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Public URL of the application; its origin is the only trusted origin
    /// in production.
    pub url: String,

    /// Production mode: disables development origins, sets `Secure` cookies.
    pub production: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            production: false,
        }
    }
}

/// CSRF protection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Cookie carrying the token (readable by client script).
    pub cookie_name: String,

    /// Header the client mirrors the cookie into.
    pub header_name: String,

    /// Legacy single-value header (`X-CSRF-Protection: 1`).
    pub legacy_header_name: String,

    /// Accept the legacy header in place of a token.
    /// Deprecated; slated for removal once all clients send tokens.
    pub accept_legacy_header: bool,

    /// Cookie lifetime in seconds.
    pub cookie_max_age_secs: u64,

    /// Mutations under this prefix are checked.
    pub protected_prefix: String,

    /// Prefixes exempt from the check (authentication routes).
    pub exempt_prefixes: Vec<String>,

    /// Webhook routes; authenticated by signature + replay guard instead.
    pub webhook_paths: Vec<String>,

    /// Origins trusted outside production.
    pub development_origins: Vec<String>,

    /// Origin suffixes of trusted preview deployments.
    pub trusted_preview_suffixes: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrf-token".to_string(),
            header_name: "x-csrf-token".to_string(),
            legacy_header_name: "x-csrf-protection".to_string(),
            accept_legacy_header: true,
            cookie_max_age_secs: 24 * 60 * 60,
            protected_prefix: "/api/".to_string(),
            exempt_prefixes: vec!["/api/auth/".to_string()],
            webhook_paths: vec!["/api/webhooks/".to_string()],
            development_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            trusted_preview_suffixes: Vec::new(),
        }
    }
}

/// Session cookie settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the signed session cookie.
    pub cookie_name: String,

    /// HMAC secret shared with the authentication layer.
    pub secret: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session-token".to_string(),
            secret: String::new(),
        }
    }
}

/// Admin dashboard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// User ids granted admin access.
    pub user_ids: Vec<String>,

    /// Path prefixes restricted to admins.
    pub path_prefixes: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            user_ids: Vec::new(),
            path_prefixes: vec!["/admin".to_string(), "/api/admin".to_string()],
        }
    }
}

/// Field encryption configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EncryptionConfig {
    /// 32-byte key as 64 hex chars, 44 base64 chars, or 32 raw bytes.
    pub key: String,
}

/// Webhook verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Accepted clock difference between sender and receiver, in seconds.
    pub tolerance_secs: u64,

    /// Header carrying the delivery id.
    pub id_header: String,

    /// Header carrying the delivery timestamp (unix seconds).
    pub timestamp_header: String,

    /// Header carrying the payload signature.
    pub signature_header: String,

    /// Shared signing secret.
    pub secret: String,

    /// Backing store for delivery-id claims.
    pub nonce_store: NonceStoreConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: 300,
            id_header: "webhook-id".to_string(),
            timestamp_header: "webhook-timestamp".to_string(),
            signature_header: "webhook-signature".to_string(),
            secret: String::new(),
            nonce_store: NonceStoreConfig::default(),
        }
    }
}

/// Nonce store backend selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NonceBackend {
    /// Per-process map. Single-instance deployments and tests only.
    #[default]
    Memory,
    /// Shared key-value store over its REST interface.
    Rest,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NonceStoreConfig {
    pub backend: NonceBackend,

    /// Base URL of the REST key-value endpoint.
    pub url: Option<String>,

    /// Bearer token for the REST endpoint.
    pub token: Option<String>,

    /// Request timeout against the shared store in milliseconds.
    pub request_timeout_ms: u64,

    /// Expiry sweep interval for the memory backend in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for NonceStoreConfig {
    fn default() -> Self {
        Self {
            backend: NonceBackend::Memory,
            url: None,
            token: None,
            request_timeout_ms: 2000,
            sweep_interval_secs: 60,
        }
    }
}

/// Quarantine storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuarantineConfig {
    /// Root directory for the filesystem blob store.
    pub blob_root: String,

    /// Isolated namespace for quarantined bytes.
    pub namespace: String,

    /// Namespace for accepted uploads.
    pub upload_namespace: String,

    /// Largest upload accepted without quarantine.
    pub max_upload_bytes: usize,

    /// MIME types accepted for upload.
    pub allowed_mime_types: Vec<String>,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            blob_root: "./data/blobs".to_string(),
            namespace: "quarantine".to_string(),
            upload_namespace: "uploads".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            allowed_mime_types: vec![
                "application/pdf".to_string(),
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/gif".to_string(),
                "text/csv".to_string(),
                "text/plain".to_string(),
            ],
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Entries older than this are deleted by the retention job.
    pub retention_days: u32,

    /// Interval between retention sweeps in seconds.
    pub cleanup_interval_secs: u64,

    /// Keyed-hash secret for client IP addresses.
    pub ip_hash_secret: String,

    /// Hex characters kept from the IP hash.
    pub ip_hash_len: usize,

    /// Maximum stored user-agent length in characters.
    pub user_agent_max_len: usize,

    /// Bounded queue between callers and the drain worker.
    pub queue_capacity: usize,

    /// Metadata key substrings whose values are redacted (case-insensitive).
    pub redact_keys: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            cleanup_interval_secs: 24 * 60 * 60,
            ip_hash_secret: String::new(),
            ip_hash_len: 16,
            user_agent_max_len: 256,
            queue_capacity: 1024,
            redact_keys: crate::audit::sanitize::DEFAULT_SENSITIVE_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: PerimeterConfig = toml::from_str(
            r#"
            [app]
            url = "https://finance.example.com"
            production = true

            [admin]
            user_ids = ["u-admin"]
            "#,
        )
        .unwrap();

        assert_eq!(config.app.url, "https://finance.example.com");
        assert_eq!(config.csrf.cookie_name, "csrf-token");
        assert_eq!(config.csrf.cookie_max_age_secs, 86_400);
        assert_eq!(config.webhook.tolerance_secs, 300);
        assert_eq!(config.audit.retention_days, 90);
        assert_eq!(config.admin.user_ids, vec!["u-admin".to_string()]);
        assert_eq!(config.webhook.nonce_store.backend, NonceBackend::Memory);
    }

    #[test]
    fn test_nonce_backend_parsing() {
        let config: PerimeterConfig = toml::from_str(
            r#"
            [webhook.nonce_store]
            backend = "rest"
            url = "https://kv.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.webhook.nonce_store.backend, NonceBackend::Rest);
        assert_eq!(
            config.webhook.nonce_store.url.as_deref(),
            Some("https://kv.example.com")
        );
    }
}
