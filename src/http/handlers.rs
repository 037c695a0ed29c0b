//! Perimeter-owned HTTP routes.

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::admin::auth::AuthenticatedUser;
use crate::audit::{AuditAction, ClientInfo};
use crate::error::{Error, Result};
use crate::http::middleware::IssuedCsrfToken;
use crate::http::server::AppState;
use crate::quarantine::{BlobAccess, PutOptions, Submission};
use crate::quarantine::types::{sanitize_filename, stored_name};
use crate::security::csrf::generate_token;

/// Header carrying the original filename of a raw-body upload.
pub const FILE_NAME_HEADER: &str = "x-file-name";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Current CSRF token, minting one if the caller has none.
pub async fn csrf_token(State(state): State<AppState>, request: Request) -> Response {
    if let Some(existing) = state.csrf.cookie_token(request.headers()) {
        return Json(json!({ "token": existing })).into_response();
    }
    if let Some(IssuedCsrfToken(token)) = request.extensions().get::<IssuedCsrfToken>() {
        return Json(json!({ "token": token })).into_response();
    }

    // Anonymous caller: the middleware only mints for sessions.
    let token = generate_token();
    let mut response = Json(json!({ "token": token })).into_response();
    match HeaderValue::from_str(&state.csrf.set_cookie_value(&token)) {
        Ok(cookie) => {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        Err(e) => tracing::error!(error = %e, "Failed to encode CSRF cookie"),
    }
    response
}

/// Raw-body upload. Files failing inspection are quarantined (422),
/// clean files are stored (201).
pub async fn upload(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    client: ClientInfo,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let filename = headers
        .get(FILE_NAME_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    if let Err(finding) = state.inspector.inspect(&body, mime_type) {
        let record = state
            .quarantine
            .quarantine(
                Submission {
                    bytes: &body,
                    filename,
                    mime_type,
                    user_id: &user.user_id,
                    reason: &finding.reason,
                    reason_code: finding.code,
                },
                &client,
            )
            .await?;
        let response = (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "File quarantined for review",
                "quarantineId": record.id,
                "reasonCode": record.reason_code,
            })),
        );
        return Ok(response.into_response());
    }

    let sanitized = sanitize_filename(filename);
    let stored = stored_name(&sanitized);
    let blob = state
        .uploads
        .put(
            &format!("{}/{}", state.upload_namespace, stored),
            &body,
            PutOptions {
                access: BlobAccess::Private,
                content_type: mime_type.to_string(),
            },
        )
        .await?;

    tracing::info!(user_id = %user.user_id, size = body.len(), "Upload stored");
    let response = (
        StatusCode::CREATED,
        Json(json!({
            "filename": sanitized,
            "storedName": stored,
            "pathname": blob.pathname,
            "size": body.len(),
        })),
    );
    Ok(response.into_response())
}

/// Signed webhook delivery. Exempt from CSRF; verified by signature, then
/// timestamp window, then nonce.
pub async fn webhook(
    State(state): State<AppState>,
    Path(source): Path<String>,
    client: ClientInfo,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let names = &state.webhook_headers;
    let id = header_str(&headers, &names.id_header);
    let timestamp = header_str(&headers, &names.timestamp_header);
    let signature = header_str(&headers, &names.signature_header);

    if let Err(e) = state.webhooks.verify(
        id.unwrap_or_default(),
        timestamp.unwrap_or_default(),
        &body,
        signature,
    ) {
        state
            .replay
            .record_rejection(&source, id, AuditAction::WebhookRejected, e.reason(), &client);
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid webhook signature" })),
        )
            .into_response();
    }

    if let Err(rejection) = state.replay.validate(&source, timestamp, id, &client).await {
        return rejection.into_response();
    }

    tracing::info!(source = %source, "Webhook accepted");
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub async fn not_found() -> Error {
    Error::NotFound("route".into())
}
