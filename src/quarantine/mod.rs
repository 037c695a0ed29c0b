//! Untrusted file quarantine subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/uploads:
//!     → inspect.rs (size, allow-list, executable, magic bytes)
//!     → clean: stored under the uploads namespace
//!     → finding: manager.rs quarantine()
//!         → blob.rs put (isolated namespace, random prefix)
//!         → repository.rs insert (PENDING)
//!         → audit FILE_QUARANTINED
//!
//! Admin review:
//!     → manager.rs approve / reject / mark_auto_clean
//!     → repository.rs transition_from_pending (atomic, at most once)
//! ```

pub mod blob;
pub mod inspect;
pub mod manager;
pub mod repository;
pub mod types;

pub use blob::{BlobAccess, BlobStore, FsBlobStore, MemoryBlobStore, PutOptions, StoredBlob};
pub use inspect::{ContentInspector, Finding};
pub use manager::{QuarantineManager, Submission};
pub use repository::{MemoryQuarantineRepository, QuarantineRepository, ReviewOutcome};
pub use types::{
    sanitize_filename, Page, QuarantineStats, QuarantineStatus, QuarantinedFile, ReasonCode,
};
