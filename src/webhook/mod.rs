//! Webhook verification subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/webhooks/{source} (CSRF-exempt):
//!     → signature.rs (HMAC over id.timestamp.body, constant-time)
//!     → replay.rs (timestamp window, then atomic nonce claim)
//!     → nonce.rs (MemoryNonceStore | RestNonceStore)
//!     → Handler accepts the delivery
//! ```
//!
//! # Design Decisions
//! - Signature before replay: unsigned traffic never consumes a nonce
//! - Nonce claim fails closed when the store is unreachable
//! - Replays are audited as suspicious activity, other refusals as rejected

pub mod nonce;
pub mod replay;
pub mod signature;

pub use nonce::{MemoryNonceStore, NonceStore, RestNonceStore};
pub use replay::{ReplayRejection, WebhookReplayGuard};
pub use signature::{SignatureError, WebhookVerifier};
