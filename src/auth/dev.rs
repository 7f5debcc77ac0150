//! Development-only token provider
//!
//! Accepts `dev.<uuid>.<role>` bearer tokens so local clients can act as any
//! user without minting JWTs. Compiled only with the `dev-auth` feature and
//! switched on at runtime outside production.

use uuid::Uuid;

use super::Principal;

const PREFIX: &str = "dev.";

pub fn parse_dev_token(token: &str) -> Option<Principal> {
    let rest = token.strip_prefix(PREFIX)?;
    let (id, role) = rest.split_once('.')?;

    Some(Principal {
        id: Uuid::parse_str(id).ok()?,
        role: role.parse().ok()?,
        role_id: None,
    })
}
