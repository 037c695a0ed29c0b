//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build collaborators → Start server
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Flush audit → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!
//! Retention (retention.rs):
//!     Interval → audit cleanup(retention_days)
//! ```

pub mod retention;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
