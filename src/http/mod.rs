//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, trace, timeout, body limit)
//!     → middleware.rs (identity, admin gate, CSRF + origin, cookie minting)
//!     → handlers.rs (csrf token, uploads, webhooks) | admin API | host routes
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod server;

pub use request::{client_info, X_REQUEST_ID};
pub use server::{build_router, AppState, Collaborators, HttpServer};
