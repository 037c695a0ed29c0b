//! Signed session cookie verification.
//!
//! Sessions are issued by the external auth layer as
//! `<user_id>.<hex HMAC-SHA256(secret, user_id)>`. This module only verifies
//! them and resolves the caller's identity.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::security::cookies::cookie_value;
use crate::security::policy::SecurityPolicy;

type HmacSha256 = Hmac<Sha256>;

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub is_admin: bool,
}

#[derive(Clone)]
pub struct SessionVerifier {
    mac: HmacSha256,
    cookie_name: String,
}

impl SessionVerifier {
    pub fn new(secret: &str, cookie_name: impl Into<String>) -> crate::Result<Self> {
        if secret.is_empty() {
            return Err(crate::Error::Config("session secret is empty".into()));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| crate::Error::Config("invalid session secret".into()))?;
        Ok(Self {
            mac,
            cookie_name: cookie_name.into(),
        })
    }

    pub fn sign(&self, user_id: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        format!("{}.{}", user_id, hex::encode(mac.finalize().into_bytes()))
    }

    /// User id carried by a well-signed token.
    pub fn verify(&self, token: &str) -> Option<String> {
        let (user_id, signature) = token.rsplit_once('.')?;
        if user_id.is_empty() {
            return None;
        }
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(user_id.to_string())
    }

    pub fn identify(&self, headers: &HeaderMap, policy: &SecurityPolicy) -> Option<Identity> {
        let token = cookie_value(headers, &self.cookie_name)?;
        let user_id = self.verify(token)?;
        Some(Identity {
            is_admin: policy.is_admin(&user_id),
            user_id,
        })
    }
}
