//! Per-request security orchestration.
//!
//! Order of checks:
//! 1. Resolve identity from the session cookie
//! 2. Admin paths: no identity → 401, non-admin → 403 (audited)
//! 3. Mutating API paths: CSRF token + origin (audited on failure)
//! 4. Authenticated caller without a CSRF cookie: mint one on the response

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::audit::{AuditAction, AuditEvent};
use crate::error::Error;
use crate::http::request::{client_info, request_id};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::csrf::generate_token;

/// CSRF token minted for this request, visible to handlers.
#[derive(Debug, Clone)]
pub struct IssuedCsrfToken(pub String);

pub const ADMIN_FORBIDDEN: &str = "Forbidden - Admin access required";

pub async fn security_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let policy = state.policy.load();
    let path = request.uri().path().to_owned();
    let method = request.method().clone();
    let identity = state.sessions.identify(request.headers(), &policy);

    if policy.is_admin_path(&path) {
        match &identity {
            None => return Error::Authentication.into_response(),
            Some(caller) if !caller.is_admin => {
                let client = client_info(request.headers(), request.extensions());
                metrics::record_admin_denial();
                tracing::warn!(
                    request_id = request_id(request.headers()),
                    user_id = %caller.user_id,
                    path = %path,
                    "Non-admin denied admin path"
                );
                state.audit.log(
                    AuditEvent::new(AuditAction::UnauthorizedAccess, "admin_path")
                        .user(Some(caller.user_id.clone()))
                        .entity_id(path.clone())
                        .metadata(json!({ "path": path, "method": method.as_str() }))
                        .client(&client),
                );
                return Error::Authorization(ADMIN_FORBIDDEN.to_string()).into_response();
            }
            Some(_) => {}
        }
    }

    if policy.requires_csrf(&method, &path) {
        let check = state.csrf.inspect(request.headers(), &policy.origin);
        if !check.passed() {
            let client = client_info(request.headers(), request.extensions());
            let reason = check.reason();
            metrics::record_csrf_rejection(reason);
            tracing::warn!(
                request_id = request_id(request.headers()),
                path = %path,
                method = %method,
                reason,
                "CSRF check failed"
            );
            let origin = request
                .headers()
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            state.audit.log(
                AuditEvent::new(AuditAction::CsrfViolation, "request")
                    .user(identity.as_ref().map(|i| i.user_id.clone()))
                    .metadata(json!({
                        "path": path,
                        "method": method.as_str(),
                        "reason": reason,
                        "headerPresent": check.header_present,
                        "cookiePresent": check.cookie_present,
                        "headerMatchesCookie": check.token_valid,
                        "originValid": check.origin_valid,
                        "origin": origin,
                    }))
                    .client(&client),
            );
            return csrf_rejection();
        }
        if check.legacy_header {
            tracing::warn!(
                path = %path,
                "Deprecated X-CSRF-Protection header accepted; client must send X-CSRF-Token"
            );
        }
    }

    let minted = match &identity {
        Some(_) if state.csrf.cookie_token(request.headers()).is_none() => {
            let token = generate_token();
            request.extensions_mut().insert(IssuedCsrfToken(token.clone()));
            Some(token)
        }
        _ => None,
    };
    if let Some(caller) = identity {
        request.extensions_mut().insert(caller);
    }

    let mut response = next.run(request).await;

    if let Some(token) = minted {
        match HeaderValue::from_str(&state.csrf.set_cookie_value(&token)) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode CSRF cookie"),
        }
    }
    response
}

pub fn csrf_rejection() -> Response {
    Error::Validation {
        message: "CSRF protection required".into(),
        details: "Invalid or missing CSRF token".into(),
    }
    .into_response()
}
