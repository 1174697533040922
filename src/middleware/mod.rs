//! Middleware for the wallet session API
//!
//! Session resolution for protected routes, request tracing and security headers.

pub mod auth;
mod security;
mod tracing;

pub use auth::{require_session, resolve_session, AuthenticatedUser, SessionError, SessionOutcome};
pub use security::{hsts_value, security_headers};
pub use tracing::request_tracing;
