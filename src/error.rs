//! Error types for the security perimeter.
//!
//! Variants follow the perimeter's failure taxonomy. Messages for crypto and
//! infrastructure failures are generic on the wire; details go to tracing.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Core error type for perimeter operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed a request-integrity check (CSRF token, origin).
    #[error("{message}: {details}")]
    Validation { message: String, details: String },

    /// No authenticated session.
    #[error("authentication required")]
    Authentication,

    /// Authenticated caller lacks the required role.
    #[error("{0}")]
    Authorization(String),

    /// A backing store or provider is unreachable.
    #[error("infrastructure unavailable: {0}")]
    Infrastructure(String),

    /// Cryptographic operation failed.
    /// Details are intentionally vague to prevent oracle attacks.
    #[error("cryptographic operation failed")]
    Crypto(String),

    /// Invalid configuration detected at startup or reload.
    #[error("configuration error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// State transition refused (record no longer pending).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed request input (query, path id, JSON body).
    #[error("bad request: {0}")]
    BadRequest(String),
}

/// Result type alias using the perimeter's Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::FORBIDDEN,
            Error::Authentication => StatusCode::UNAUTHORIZED,
            Error::Authorization(_) => StatusCode::FORBIDDEN,
            Error::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Crypto(_) | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Error::Authentication => "Authentication required".to_string(),
            Error::Authorization(msg) | Error::Conflict(msg) | Error::BadRequest(msg) => {
                msg.clone()
            }
            Error::Infrastructure(_) => "Service temporarily unavailable".to_string(),
            Error::Crypto(_) | Error::Config(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, detail = ?self, "Request failed");
        }
        let body = match &self {
            Error::Validation { message, details } => {
                serde_json::json!({ "error": message, "details": details })
            }
            other => serde_json::json!({ "error": other.public_message() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Failure reported by a collaborator store (audit log, quarantine records,
/// nonce store, blob storage).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Error::NotFound(what),
            other => Error::Infrastructure(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Authentication.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Authorization("nope".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Infrastructure("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(Error::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            Error::Validation {
                message: "bad".into(),
                details: "token".into()
            }
            .status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = Error::Infrastructure("redis at 10.0.0.3 refused".into());
        assert!(!err.public_message().contains("10.0.0.3"));

        let err = Error::Crypto("tag mismatch at byte 4".into());
        assert_eq!(err.to_string(), "cryptographic operation failed");
    }

    #[test]
    fn test_store_error_conversion() {
        let err: Error = StoreError::NotFound("file".into()).into();
        assert!(matches!(err, Error::NotFound(_)));

        let err: Error = StoreError::Unavailable("timeout".into()).into();
        assert!(matches!(err, Error::Infrastructure(_)));
    }
}
