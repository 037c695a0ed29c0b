use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::admin::auth::AdminIdentity;
use crate::audit::{AuditLogEntry, ClientInfo};
use crate::error::{Error, Result};
use crate::http::server::AppState;
use crate::quarantine::{Page, QuarantineStats, QuarantineStatus, QuarantinedFile};

const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_RECENT_LIMIT: usize = 50;
const MAX_RECENT_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewBody {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupBody {
    pub retention_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReviewResult {
    pub success: bool,
    pub status: QuarantineStatus,
}

#[derive(Debug, Serialize)]
pub struct CleanupResult {
    pub deleted: u64,
    #[serde(rename = "retentionDays")]
    pub retention_days: u32,
}

/// Optional JSON body: empty means defaults.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| Error::BadRequest(format!("invalid JSON body: {e}")))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| Error::BadRequest(format!("invalid quarantine id {raw:?}")))
}

pub async fn list_quarantine(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<QuarantinedFile>>> {
    let status = match params.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            QuarantineStatus::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("unknown status {raw:?}")))?,
        ),
        None => None,
    };
    let page = state
        .quarantine
        .list(
            status,
            params.page.unwrap_or(1),
            params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

pub async fn quarantine_stats(
    State(state): State<AppState>,
    _admin: AdminIdentity,
) -> Result<Json<QuarantineStats>> {
    Ok(Json(state.quarantine.stats().await?))
}

pub async fn approve(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
    client: ClientInfo,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ReviewResult>> {
    let id = parse_id(&id)?;
    let ReviewBody { notes } = optional_json(&body)?;
    if !state.quarantine.approve(id, &admin.user_id, notes, &client).await? {
        return Err(not_pending());
    }
    Ok(Json(ReviewResult {
        success: true,
        status: QuarantineStatus::Approved,
    }))
}

pub async fn reject(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
    client: ClientInfo,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ReviewResult>> {
    let id = parse_id(&id)?;
    let ReviewBody { notes } = optional_json(&body)?;
    if !state.quarantine.reject(id, &admin.user_id, notes, &client).await? {
        return Err(not_pending());
    }
    Ok(Json(ReviewResult {
        success: true,
        status: QuarantineStatus::Rejected,
    }))
}

fn not_pending() -> Error {
    Error::Conflict("Quarantine record not found or already reviewed".into())
}

pub async fn audit_cleanup(
    State(state): State<AppState>,
    AdminIdentity(admin): AdminIdentity,
    body: Bytes,
) -> Result<Json<CleanupResult>> {
    let CleanupBody { retention_days } = optional_json(&body)?;
    let retention_days = retention_days.unwrap_or(state.retention_days);
    if retention_days == 0 {
        return Err(Error::BadRequest("retentionDays must be positive".into()));
    }
    tracing::info!(admin = %admin.user_id, retention_days, "Manual audit cleanup");
    let deleted = state.audit.cleanup(retention_days).await;
    Ok(Json(CleanupResult {
        deleted,
        retention_days,
    }))
}

pub async fn audit_recent(
    State(state): State<AppState>,
    _admin: AdminIdentity,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<AuditLogEntry>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    Ok(Json(state.audit.recent(limit).await?))
}
