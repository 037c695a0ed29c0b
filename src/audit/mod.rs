//! Audit subsystem.
//!
//! # Data Flow
//! ```text
//! Security decision (csrf, admin, webhook, quarantine):
//!     → AuditEvent (raw metadata, raw client info)
//!     → logger.rs: sanitize.rs redacts metadata, hashes IP, truncates UA
//!     → bounded channel (try_send, never awaited)
//!     → drain worker → store.rs (AuditStore)
//!
//! Retention job:
//!     → logger.cleanup(retention_days) → store.delete_before(cutoff)
//! ```
//!
//! # Design Decisions
//! - Audit writes never add latency to, or fail, a security decision
//! - Raw metadata never sits in the queue; it is sanitized first
//! - The deny-list is configuration, traversal is code

pub mod entry;
pub mod logger;
pub mod sanitize;
pub mod store;

pub use entry::{AuditAction, AuditEvent, AuditLogEntry, ClientInfo};
pub use logger::{AuditLogger, AuditWorker};
pub use sanitize::{IpHasher, Redactor, REDACTED};
pub use store::{AuditStore, MemoryAuditStore};
