//! Field-level authenticated encryption for PII columns.
//!
//! Values are sealed with AES-256-GCM under a single static key and stored as
//! text of the form:
//!
//! ```text
//! base64(iv) ":" base64(auth_tag) ":" base64(ciphertext)
//! ```
//!
//! Decryption is fail-open: anything that is not exactly three segments is
//! treated as legacy plaintext, and anything that fails to authenticate is
//! returned as stored. Both cases are counted in metrics and logged without
//! the value.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{Map, Value};

use crate::crypto::key::{FieldKey, KeyError};
use crate::error::{Error, Result};
use crate::observability::metrics;

/// Size of the random IV in bytes (96 bits).
pub const IV_SIZE: usize = 12;

/// Size of the GCM authentication tag in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

const SEPARATOR: char = ':';

/// Encrypts and decrypts individual record fields.
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    pub fn new(key: &FieldKey) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Build from the configured key text. Fails fast on a malformed key.
    pub fn from_config_key(raw: &str) -> std::result::Result<Self, KeyError> {
        FieldKey::parse(raw).map(|key| Self::new(&key))
    }

    /// Seal `plaintext` under a fresh random IV.
    ///
    /// The empty string passes through unchanged.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let iv = Aes256Gcm::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&iv, plaintext.as_bytes())
            .map_err(|_| Error::Crypto("field encryption failed".into()))?;

        // aes-gcm appends the tag to the ciphertext.
        let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

        Ok(format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            BASE64.encode(iv),
            BASE64.encode(tag),
            BASE64.encode(ciphertext)
        ))
    }

    /// Recover the plaintext of a stored value.
    ///
    /// Never fails: legacy plaintext and undecryptable values are returned
    /// as given.
    pub fn decrypt(&self, stored: &str) -> String {
        if stored.is_empty() {
            return String::new();
        }

        let segments: Vec<&str> = stored.split(SEPARATOR).collect();
        if segments.len() != 3 {
            return stored.to_string();
        }

        match self.open(segments[0], segments[1], segments[2]) {
            Ok(plaintext) => plaintext,
            Err(cause) => {
                metrics::record_decrypt_passthrough(cause);
                tracing::warn!(cause, "Field decryption failed, returning stored value");
                stored.to_string()
            }
        }
    }

    fn open(&self, iv: &str, tag: &str, ciphertext: &str) -> std::result::Result<String, &'static str> {
        let iv = BASE64.decode(iv).map_err(|_| "encoding")?;
        let tag = BASE64.decode(tag).map_err(|_| "encoding")?;
        let mut sealed = BASE64.decode(ciphertext).map_err(|_| "encoding")?;

        if iv.len() != IV_SIZE || tag.len() != TAG_SIZE {
            return Err("shape");
        }

        sealed.extend_from_slice(&tag);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
            .map_err(|_| "auth_tag")?;

        String::from_utf8(plaintext).map_err(|_| "utf8")
    }

    /// Encrypt the listed string fields of a record in place.
    ///
    /// Missing, null and non-string fields are left untouched.
    pub fn encrypt_fields(&self, record: &mut Map<String, Value>, fields: &[&str]) -> Result<()> {
        for field in fields {
            if let Some(Value::String(value)) = record.get_mut(*field) {
                *value = self.encrypt(value)?;
            }
        }
        Ok(())
    }

    /// Decrypt the listed string fields of a record in place.
    pub fn decrypt_fields(&self, record: &mut Map<String, Value>, fields: &[&str]) {
        for field in fields {
            if let Some(Value::String(value)) = record.get_mut(*field) {
                *value = self.decrypt(value);
            }
        }
    }
}

/// Read/write adapter binding a cipher to the PII columns of one entity.
///
/// The persistence layer runs rows through `seal` before writing and `unseal`
/// after reading.
#[derive(Clone)]
pub struct PiiCodec {
    cipher: FieldCipher,
    fields: Vec<String>,
}

impl PiiCodec {
    pub fn new(cipher: FieldCipher, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            cipher,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn field_refs(&self) -> Vec<&str> {
        self.fields.iter().map(String::as_str).collect()
    }

    pub fn seal(&self, mut row: Value) -> Result<Value> {
        if let Value::Object(map) = &mut row {
            self.cipher.encrypt_fields(map, &self.field_refs())?;
        }
        Ok(row)
    }

    pub fn unseal(&self, mut row: Value) -> Value {
        if let Value::Object(map) = &mut row {
            self.cipher.decrypt_fields(map, &self.field_refs());
        }
        row
    }
}
