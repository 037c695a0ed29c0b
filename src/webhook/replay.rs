//! Webhook replay protection.
//!
//! A delivery is accepted only if its timestamp is inside the tolerance
//! window and its id has never been claimed. The nonce check fails closed:
//! if the store cannot answer, the delivery is rejected.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::audit::{AuditAction, AuditEvent, AuditLogger, ClientInfo};
use crate::error::StoreError;
use crate::observability::metrics;
use crate::webhook::nonce::NonceStore;

const NONCE_PREFIX: &str = "webhook:nonce:";

/// Why a delivery was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayRejection {
    MissingId,
    InvalidTimestamp,
    Replayed,
    StoreUnavailable,
}

impl ReplayRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            ReplayRejection::MissingId => "missing_id",
            ReplayRejection::InvalidTimestamp => "invalid_timestamp",
            ReplayRejection::Replayed => "replayed_delivery",
            ReplayRejection::StoreUnavailable => "nonce_store_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ReplayRejection::MissingId | ReplayRejection::InvalidTimestamp => {
                StatusCode::BAD_REQUEST
            }
            ReplayRejection::Replayed => StatusCode::CONFLICT,
            ReplayRejection::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ReplayRejection::MissingId => "Missing webhook id",
            ReplayRejection::InvalidTimestamp => "Webhook timestamp outside tolerance",
            ReplayRejection::Replayed => "Webhook already processed",
            ReplayRejection::StoreUnavailable => "Webhook verification unavailable",
        }
    }
}

impl IntoResponse for ReplayRejection {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.message() }))).into_response()
    }
}

#[derive(Clone)]
pub struct WebhookReplayGuard {
    store: Arc<dyn NonceStore>,
    tolerance: Duration,
    audit: AuditLogger,
}

impl WebhookReplayGuard {
    pub fn new(store: Arc<dyn NonceStore>, tolerance: Duration, audit: AuditLogger) -> Self {
        Self {
            store,
            tolerance,
            audit,
        }
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    /// `|now - ts|` within tolerance, `ts` in unix seconds.
    pub fn validate_timestamp(&self, timestamp: i64) -> bool {
        self.validate_timestamp_at(timestamp, Utc::now().timestamp())
    }

    pub fn validate_timestamp_at(&self, timestamp: i64, now: i64) -> bool {
        let skew = now.abs_diff(timestamp);
        skew <= self.tolerance.as_secs()
    }

    /// Claims stay for twice the tolerance so a delivery cannot age out of
    /// the nonce store while its timestamp is still acceptable.
    fn nonce_ttl(&self) -> Duration {
        self.tolerance.saturating_mul(2)
    }

    async fn claim(&self, id: &str) -> Result<bool, StoreError> {
        let key = format!("{NONCE_PREFIX}{id}");
        self.store.claim(&key, self.nonce_ttl()).await
    }

    /// `true` exactly once per id within the TTL. Store failures count as
    /// already seen.
    pub async fn check_and_store_nonce(&self, id: &str) -> bool {
        match self.claim(id).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::error!(error = %e, "Nonce store unavailable, rejecting webhook");
                false
            }
        }
    }

    /// Run the timestamp and nonce checks. Every rejection is audited once.
    pub async fn validate(
        &self,
        source: &str,
        timestamp: Option<&str>,
        id: Option<&str>,
        client: &ClientInfo,
    ) -> Result<(), ReplayRejection> {
        let id = id.map(str::trim).filter(|id| !id.is_empty());
        let Some(id) = id else {
            self.reject(source, None, ReplayRejection::MissingId, client);
            return Err(ReplayRejection::MissingId);
        };

        let ts = timestamp.and_then(|t| t.trim().parse::<i64>().ok());
        if !ts.is_some_and(|ts| self.validate_timestamp(ts)) {
            self.reject(source, Some(id), ReplayRejection::InvalidTimestamp, client);
            return Err(ReplayRejection::InvalidTimestamp);
        }

        match self.claim(id).await {
            Ok(true) => {
                metrics::record_webhook_accepted();
                Ok(())
            }
            Ok(false) => {
                self.reject(source, Some(id), ReplayRejection::Replayed, client);
                Err(ReplayRejection::Replayed)
            }
            Err(e) => {
                tracing::error!(error = %e, source, "Nonce store unavailable, rejecting webhook");
                self.reject(source, Some(id), ReplayRejection::StoreUnavailable, client);
                Err(ReplayRejection::StoreUnavailable)
            }
        }
    }

    fn reject(&self, source: &str, id: Option<&str>, why: ReplayRejection, client: &ClientInfo) {
        let action = match why {
            ReplayRejection::Replayed => AuditAction::SuspiciousActivity,
            _ => AuditAction::WebhookRejected,
        };
        self.record_rejection(source, id, action, why.reason(), client);
    }

    /// Audit and count a refused delivery. Used for signature failures too.
    pub fn record_rejection(
        &self,
        source: &str,
        id: Option<&str>,
        action: AuditAction,
        reason: &'static str,
        client: &ClientInfo,
    ) {
        metrics::record_webhook_rejection(reason);
        tracing::warn!(source, reason, "Webhook rejected");

        let mut event = AuditEvent::new(action, "webhook")
            .metadata(json!({ "source": source, "reason": reason }))
            .client(client);
        if let Some(id) = id {
            event = event.entity_id(id);
        }
        self.audit.log(event);
    }
}
