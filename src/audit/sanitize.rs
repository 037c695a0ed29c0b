//! Metadata redaction and client fingerprint hashing.

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Replacement for redacted values.
pub const REDACTED: &str = "[REDACTED]";

/// Key substrings whose values never reach the audit store.
pub const DEFAULT_SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "apiKey",
    "creditCard",
    "ssn",
    "email",
    "phone",
    "address",
    "amount",
];

/// Case-insensitive substring matcher over metadata keys.
#[derive(Debug, Clone)]
pub struct Redactor {
    patterns: Vec<String>,
}

impl Redactor {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.patterns.iter().any(|p| key.contains(p.as_str()))
    }

    /// Copy of `value` with sensitive keys redacted at every depth.
    pub fn sanitize(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut clean = Map::with_capacity(map.len());
                for (key, inner) in map {
                    let inner = if self.is_sensitive(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        self.sanitize(inner)
                    };
                    clean.insert(key.clone(), inner);
                }
                Value::Object(clean)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.sanitize(v)).collect()),
            other => other.clone(),
        }
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_KEYS)
    }
}

/// One-way keyed hash of client addresses.
///
/// Equal inputs map to equal outputs, so repeat offenders can be correlated
/// without retaining the address.
#[derive(Clone)]
pub struct IpHasher {
    mac: HmacSha256,
    len: usize,
}

impl IpHasher {
    pub fn new(secret: &str, len: usize) -> crate::Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| crate::Error::Config("invalid ip hash secret".into()))?;
        Ok(Self {
            mac,
            len: len.clamp(8, 64),
        })
    }

    pub fn hash(&self, ip: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(ip.trim().as_bytes());
        let mut digest = hex::encode(mac.finalize().into_bytes());
        digest.truncate(self.len);
        digest
    }
}

/// Cut a user agent to at most `max` characters.
pub fn truncate_user_agent(user_agent: &str, max: usize) -> String {
    user_agent.chars().take(max).collect()
}
