//! Security perimeter for a personal-finance web application.
//!
//! CSRF defense, PII field encryption, webhook replay protection and an
//! untrusted-file quarantine, all reporting to a shared audit log.

pub mod admin;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod quarantine;
pub mod security;
pub mod webhook;

pub use config::schema::PerimeterConfig;
pub use error::{Error, Result};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
