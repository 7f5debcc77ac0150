//! Middleware for the marketplace API
//!
//! This module provides middleware for request tracing, security headers,
//! and authentication.

pub mod auth;
mod security;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser, RiderUser};
pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;
