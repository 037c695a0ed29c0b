//! Webhook payload signatures.
//!
//! Senders sign `"{id}.{timestamp}.{body}"` with HMAC-SHA256 and send
//! `v1,<base64 mac>` in the signature header. Several space-separated
//! signatures may be present during secret rotation on the sender side.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const VERSION: &str = "v1";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,

    #[error("signature header malformed")]
    Malformed,

    #[error("signature mismatch")]
    Mismatch,
}

impl SignatureError {
    pub fn reason(&self) -> &'static str {
        match self {
            SignatureError::Missing => "signature_missing",
            SignatureError::Malformed => "signature_malformed",
            SignatureError::Mismatch => "signature_mismatch",
        }
    }
}

#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
}

impl WebhookVerifier {
    pub fn new(secret: &str) -> crate::Result<Self> {
        if secret.is_empty() {
            return Err(crate::Error::Config("webhook secret is empty".into()));
        }
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| crate::Error::Config("invalid webhook secret".into()))?;
        Ok(Self { mac })
    }

    fn keyed(&self, id: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    }

    /// Header value a sender would attach to this delivery.
    pub fn sign(&self, id: &str, timestamp: &str, body: &[u8]) -> String {
        let digest = self.keyed(id, timestamp, body).finalize().into_bytes();
        format!("{VERSION},{}", BASE64.encode(digest))
    }

    /// Accept if any `v1` candidate in `header` matches. Constant-time per
    /// candidate.
    pub fn verify(
        &self,
        id: &str,
        timestamp: &str,
        body: &[u8],
        header: Option<&str>,
    ) -> Result<(), SignatureError> {
        let header = header.map(str::trim).filter(|h| !h.is_empty());
        let Some(header) = header else {
            return Err(SignatureError::Missing);
        };

        let mut saw_candidate = false;
        for candidate in header.split_whitespace() {
            let Some((version, encoded)) = candidate.split_once(',') else {
                continue;
            };
            if version != VERSION {
                continue;
            }
            let Ok(signature) = BASE64.decode(encoded) else {
                continue;
            };
            saw_candidate = true;
            if self.keyed(id, timestamp, body).verify_slice(&signature).is_ok() {
                return Ok(());
            }
        }

        if saw_candidate {
            Err(SignatureError::Mismatch)
        } else {
            Err(SignatureError::Malformed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec-test").unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let v = verifier();
        let sig = v.sign("msg_1", "1700000000", br#"{"type":"paid"}"#);
        assert!(sig.starts_with("v1,"));
        assert_eq!(
            v.verify("msg_1", "1700000000", br#"{"type":"paid"}"#, Some(&sig)),
            Ok(())
        );
    }

    #[test]
    fn test_any_candidate_may_match() {
        let v = verifier();
        let good = v.sign("msg_1", "1", b"body");
        let header = format!("v1,AAAA v2,zzz {good}");
        assert_eq!(v.verify("msg_1", "1", b"body", Some(&header)), Ok(()));
    }

    #[test]
    fn test_bound_to_id_timestamp_and_body() {
        let v = verifier();
        let sig = v.sign("msg_1", "1", b"body");
        assert_eq!(
            v.verify("msg_2", "1", b"body", Some(&sig)),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            v.verify("msg_1", "2", b"body", Some(&sig)),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            v.verify("msg_1", "1", b"bodY", Some(&sig)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_and_malformed() {
        let v = verifier();
        assert_eq!(v.verify("a", "1", b"", None), Err(SignatureError::Missing));
        assert_eq!(v.verify("a", "1", b"", Some("  ")), Err(SignatureError::Missing));
        assert_eq!(
            v.verify("a", "1", b"", Some("garbage")),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            v.verify("a", "1", b"", Some("v1,@@not-base64@@")),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let sig = WebhookVerifier::new("other").unwrap().sign("a", "1", b"x");
        assert_eq!(
            verifier().verify("a", "1", b"x", Some(&sig)),
            Err(SignatureError::Mismatch)
        );
    }
}
