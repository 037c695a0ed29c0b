//! Admin review API, mounted under `/api/admin`.

pub mod auth;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/quarantine", get(list_quarantine))
        .route("/quarantine/stats", get(quarantine_stats))
        .route("/quarantine/{id}/approve", post(approve))
        .route("/quarantine/{id}/reject", post(reject))
        .route("/audit/cleanup", post(audit_cleanup))
        .route("/audit/recent", get(audit_recent))
}
