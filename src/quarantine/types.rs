//! Quarantine record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_FILENAME_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuarantineStatus {
    Pending,
    Approved,
    Rejected,
    AutoClean,
}

impl QuarantineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineStatus::Pending => "PENDING",
            QuarantineStatus::Approved => "APPROVED",
            QuarantineStatus::Rejected => "REJECTED",
            QuarantineStatus::AutoClean => "AUTO_CLEAN",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(QuarantineStatus::Pending),
            "APPROVED" => Some(QuarantineStatus::Approved),
            "REJECTED" => Some(QuarantineStatus::Rejected),
            "AUTO_CLEAN" => Some(QuarantineStatus::AutoClean),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, QuarantineStatus::Pending)
    }
}

/// Why content validation refused an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    FileTooLarge,
    DisallowedType,
    MimeMismatch,
    ExecutableContent,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::FileTooLarge => "FILE_TOO_LARGE",
            ReasonCode::DisallowedType => "DISALLOWED_TYPE",
            ReasonCode::MimeMismatch => "MIME_MISMATCH",
            ReasonCode::ExecutableContent => "EXECUTABLE_CONTENT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuarantinedFile {
    pub id: Uuid,
    /// Sanitized original name.
    pub filename: String,
    /// Unique name inside the isolated namespace.
    pub stored_name: String,
    /// Blob location; `None` if storage failed or the file was rejected.
    pub url: Option<String>,
    pub mime_type: String,
    pub size: u64,
    pub user_id: String,
    pub reason: String,
    pub reason_code: ReasonCode,
    pub status: QuarantineStatus,
    pub reviewed_by: Option<String>,
    pub review_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub total: u64,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Separators never survive, so the result is always a single path
/// component. A name made only of dots is neutralized as well.
pub fn sanitize_filename(raw: &str) -> String {
    let mut clean: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_LEN)
        .collect();

    if clean.chars().all(|c| c == '.') {
        clean = clean.replace('.', "_");
    }
    if clean.is_empty() {
        clean.push_str("unnamed");
    }
    clean
}

/// Storage name: random prefix plus the sanitized name.
pub fn stored_name(sanitized: &str) -> String {
    format!("{}-{}", Uuid::new_v4().simple(), sanitized)
}
