//! Authentication module
//!
//! Bearer-token authentication for customers, riders and admins.
//! - JWT access token generation and validation
//! - Caller identity ([`Principal`]) and role scoping per vertical
//! - Optional development token provider (`dev-auth` feature)

#[cfg(feature = "dev-auth")]
mod dev;
mod jwt;
mod service;

use serde::Serialize;
use uuid::Uuid;

use crate::models::UserRole;
use crate::order::Vertical;

pub use jwt::{generate_access_token, verify_token, Claims, JwtError};
pub use service::{AuthError, AuthService};

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: UserRole,
    pub role_id: Option<String>,
}

impl Principal {
    pub fn new(id: Uuid, role: UserRole) -> Self {
        Self {
            id,
            role,
            role_id: None,
        }
    }

    pub fn administers(&self, vertical: Vertical) -> bool {
        self.role.administers(vertical)
    }
}
