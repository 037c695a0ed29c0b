//! Cryptography subsystem.
//!
//! # Data Flow
//! ```text
//! Persistence write adapter:
//!     → PiiCodec::seal → FieldCipher::encrypt (AES-256-GCM, random IV)
//!     → "iv:tag:ciphertext" stored
//!
//! Persistence read adapter:
//!     → PiiCodec::unseal → FieldCipher::decrypt
//!     → plaintext, or the stored value unchanged (legacy / undecryptable)
//! ```
//!
//! # Design Decisions
//! - One static key for the dataset; no key ids in the stored format
//! - Decrypt fails open for migration tolerance; encrypt fails closed
//! - Key material is zeroized on drop and never printed

pub mod field_cipher;
pub mod key;

pub use field_cipher::{FieldCipher, PiiCodec};
pub use key::{FieldKey, KeyError, KEY_SIZE};
