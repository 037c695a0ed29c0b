//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → session.rs (resolve identity from the signed session cookie)
//!     → policy.rs (admin path? mutating API path? webhook path?)
//!     → csrf.rs (double-submit token) + origin.rs (Origin/Referer)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Token comparison is constant-time
//! - Fail closed: reject on any failed check
//! - Webhook routes skip CSRF and are verified by the webhook subsystem
//! - Policy is hot-swappable; secrets are not

pub mod cookies;
pub mod csrf;
pub mod origin;
pub mod policy;
pub mod session;

pub use csrf::{generate_token, is_valid_token, CsrfCheck, CsrfGuard};
pub use origin::{canonical_origin, OriginPolicy};
pub use policy::{is_safe_method, PolicyHandle, SecurityPolicy};
pub use session::{Identity, SessionVerifier};
