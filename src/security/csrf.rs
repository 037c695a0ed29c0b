//! Double-submit cookie CSRF defense.
//!
//! The server mints a random token into a readable cookie; client script
//! mirrors it into a request header. A cross-site page can make the browser
//! send the cookie but cannot read it to forge the header.

use axum::http::HeaderMap;
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::config::CsrfConfig;
use crate::security::cookies::cookie_value;
use crate::security::origin::OriginPolicy;

/// Random bytes per token (hex-encoded to 64 chars).
pub const TOKEN_BYTES: usize = 32;

/// Fresh token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Constant-time comparison of the header token against the cookie token.
pub fn is_valid_token(header_token: Option<&str>, cookie_token: Option<&str>) -> bool {
    let (Some(header), Some(cookie)) = (header_token, cookie_token) else {
        return false;
    };
    if header.is_empty() || cookie.is_empty() || header.len() != cookie.len() {
        return false;
    }
    header.as_bytes().ct_eq(cookie.as_bytes()).into()
}

/// Outcome of inspecting one request. Never carries token values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrfCheck {
    pub header_present: bool,
    pub cookie_present: bool,
    pub token_valid: bool,
    /// Token check satisfied by the deprecated single-value header.
    pub legacy_header: bool,
    pub origin_valid: bool,
}

impl CsrfCheck {
    pub fn passed(&self) -> bool {
        (self.token_valid || self.legacy_header) && self.origin_valid
    }

    /// Metric label for a failed check.
    pub fn reason(&self) -> &'static str {
        if self.token_valid || self.legacy_header {
            "origin"
        } else if !self.header_present || !self.cookie_present {
            "token_missing"
        } else {
            "token_mismatch"
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsrfGuard {
    cookie_name: String,
    header_name: String,
    legacy_header_name: String,
    accept_legacy_header: bool,
    max_age_secs: u64,
    secure: bool,
}

impl CsrfGuard {
    pub fn from_config(config: &CsrfConfig, production: bool) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            header_name: config.header_name.to_ascii_lowercase(),
            legacy_header_name: config.legacy_header_name.to_ascii_lowercase(),
            accept_legacy_header: config.accept_legacy_header,
            max_age_secs: config.cookie_max_age_secs,
            secure: production,
        }
    }

    pub fn cookie_token<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        cookie_value(headers, &self.cookie_name)
    }

    pub fn inspect(&self, headers: &HeaderMap, origins: &OriginPolicy) -> CsrfCheck {
        let header_token = header_str(headers, &self.header_name);
        let cookie_token = self.cookie_token(headers);
        let token_valid = is_valid_token(header_token, cookie_token);

        // Deprecated: `X-CSRF-Protection: 1` predates the double-submit token.
        // Remove once all clients send X-CSRF-Token.
        let legacy_header = !token_valid
            && self.accept_legacy_header
            && header_str(headers, &self.legacy_header_name) == Some("1");

        let origin_valid = origins.is_valid_origin(
            header_str(headers, "origin"),
            header_str(headers, "referer"),
        );

        CsrfCheck {
            header_present: header_token.is_some_and(|t| !t.is_empty()),
            cookie_present: cookie_token.is_some(),
            token_valid,
            legacy_header,
            origin_valid,
        }
    }

    /// `Set-Cookie` value for a freshly minted token. Readable by script.
    pub fn set_cookie_value(&self, token: &str) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; SameSite=Strict",
            self.cookie_name, token, self.max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}
