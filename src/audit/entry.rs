//! Audit event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Security actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// Mutating API request failed the token or origin check.
    CsrfViolation,
    /// Authenticated non-admin attempted an admin path.
    UnauthorizedAccess,
    /// Webhook delivery refused (signature, timestamp, store outage).
    WebhookRejected,
    /// Replayed webhook delivery id.
    SuspiciousActivity,
    /// Upload failed content validation and was isolated.
    FileQuarantined,
    FileQuarantineApproved,
    FileQuarantineRejected,
    /// Automated rescan cleared a pending file.
    FileQuarantineAutoCleaned,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CsrfViolation => "CSRF_VIOLATION",
            AuditAction::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            AuditAction::WebhookRejected => "WEBHOOK_REJECTED",
            AuditAction::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            AuditAction::FileQuarantined => "FILE_QUARANTINED",
            AuditAction::FileQuarantineApproved => "FILE_QUARANTINE_APPROVED",
            AuditAction::FileQuarantineRejected => "FILE_QUARANTINE_REJECTED",
            AuditAction::FileQuarantineAutoCleaned => "FILE_QUARANTINE_AUTO_CLEANED",
        }
    }
}

/// Where a request came from, as seen at the edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An event as submitted by a caller, before sanitization.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: Value,
    pub client: ClientInfo,
}

impl AuditEvent {
    pub fn new(action: AuditAction, entity_type: impl Into<String>) -> Self {
        Self {
            user_id: None,
            action,
            entity_type: entity_type.into(),
            entity_id: None,
            metadata: Value::Null,
            client: ClientInfo::default(),
        }
    }

    pub fn user(mut self, user_id: Option<impl Into<String>>) -> Self {
        self.user_id = user_id.map(Into::into);
        self
    }

    pub fn entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.client = client.clone();
        self
    }
}

/// Persisted audit record. Metadata is sanitized and the IP hashed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: Value,
    /// Truncated keyed hash of the client address.
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
