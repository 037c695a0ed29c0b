//! Field encryption key loading.
//!
//! The key is 32 bytes and may be supplied three ways:
//! - 64 hex characters
//! - 44 base64 characters (standard alphabet, padded)
//! - 32 raw bytes

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the field encryption key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Why a configured key was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("encryption key is not set")]
    Missing,

    #[error(
        "encryption key must be 64 hex chars, 44 base64 chars, or 32 raw bytes (got {0} bytes)"
    )]
    InvalidLength(usize),

    #[error("encryption key is not valid {0}")]
    InvalidEncoding(&'static str),
}

/// A 256-bit key for field encryption. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey([u8; KEY_SIZE]);

impl FieldKey {
    /// Parse a key from its configured textual form.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let raw = raw.trim();
        let mut bytes = match raw.len() {
            0 => return Err(KeyError::Missing),
            64 => hex::decode(raw).map_err(|_| KeyError::InvalidEncoding("hex"))?,
            44 => BASE64
                .decode(raw)
                .map_err(|_| KeyError::InvalidEncoding("base64"))?,
            KEY_SIZE => raw.as_bytes().to_vec(),
            n => return Err(KeyError::InvalidLength(n)),
        };

        if bytes.len() != KEY_SIZE {
            let len = bytes.len();
            bytes.zeroize();
            return Err(KeyError::InvalidLength(len));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        bytes.zeroize();
        Ok(Self(key))
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Hex form suitable for configuration.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldKey(<redacted>)")
    }
}
