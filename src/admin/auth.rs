//! Identity extractors.
//!
//! The security middleware already gates admin paths; these extractors make
//! each handler state its own requirement as well.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::Error;
use crate::http::middleware::ADMIN_FORBIDDEN;
use crate::http::server::AppState;
use crate::security::Identity;

/// Any caller with a valid session.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Identity);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(Self(identity.clone()));
        }
        let policy = state.policy.load();
        state
            .sessions
            .identify(&parts.headers, &policy)
            .map(Self)
            .ok_or(Error::Authentication)
    }
}

/// Caller listed as an admin.
#[derive(Debug, Clone)]
pub struct AdminIdentity(pub Identity);

impl FromRequestParts<AppState> for AdminIdentity {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthenticatedUser(identity) = AuthenticatedUser::from_request_parts(parts, state).await?;
        if identity.is_admin {
            Ok(Self(identity))
        } else {
            Err(Error::Authorization(ADMIN_FORBIDDEN.to_string()))
        }
    }
}
