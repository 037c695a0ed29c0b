//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, env secret overrides)
//!     → validation.rs (semantic checks, key decoding)
//!     → PerimeterConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the request SecurityPolicy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the request policy hot-reloads
//! - All fields have defaults to allow minimal configs
//! - Secrets may come from the environment instead of the file

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    AdminConfig, AppConfig, AuditConfig, CsrfConfig, EncryptionConfig, ListenerConfig,
    NonceBackend, NonceStoreConfig, ObservabilityConfig, PerimeterConfig, QuarantineConfig,
    SessionConfig, WebhookConfig,
};
