//! API handlers for the marketplace server

pub mod assignments;
mod extract;
pub mod orders;

pub use assignments::*;
pub use extract::{ApiJson, ApiPath, ApiQuery};
pub use orders::*;

// Re-export extractors from middleware for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser, RiderUser};
