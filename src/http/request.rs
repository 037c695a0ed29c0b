//! Request metadata extraction.
//!
//! # Responsibilities
//! - Resolve the client address behind proxies
//! - Read the request id assigned by the id layer
//!
//! # Design Decisions
//! - First `X-Forwarded-For` hop wins, then `X-Real-IP`, then the socket
//! - Addresses are only ever handed to the audit logger, which hashes them

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap},
};

use crate::audit::ClientInfo;

/// Request id header set by `SetRequestIdLayer`.
pub const X_REQUEST_ID: &str = "x-request-id";

pub fn client_info(headers: &HeaderMap, extensions: &Extensions) -> ClientInfo {
    ClientInfo {
        ip_address: client_ip(headers, extensions),
        user_agent: header_value(headers, "user-agent").map(str::to_string),
    }
}

fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    if let Some(forwarded) = header_value(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return Some(first.to_string());
        }
    }
    if let Some(real_ip) = header_value(headers, "x-real-ip") {
        return Some(real_ip.to_string());
    }
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

pub fn request_id(headers: &HeaderMap) -> &str {
    header_value(headers, X_REQUEST_ID).unwrap_or("unknown")
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(client_info(&parts.headers, &parts.extensions))
    }
}
