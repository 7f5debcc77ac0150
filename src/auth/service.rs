//! Authentication service
//!
//! Resolves bearer tokens into a [`Principal`].

use thiserror::Error;

use super::jwt::{generate_access_token, verify_token, JwtError};
use super::Principal;

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token error: {0}")]
    TokenError(String),
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::TokenExpired => AuthError::TokenExpired,
            JwtError::DecodingFailed(msg) | JwtError::InvalidToken(msg) => {
                AuthError::InvalidToken(msg)
            }
            JwtError::EncodingFailed(msg) => AuthError::TokenError(msg),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
    access_token_ttl_seconds: i64,
    dev_tokens: bool,
}

impl AuthService {
    pub fn new(jwt_secret: String, access_token_ttl_seconds: i64) -> Self {
        Self {
            jwt_secret,
            access_token_ttl_seconds,
            dev_tokens: false,
        }
    }

    /// Also accept `dev.<uuid>.<role>` tokens. Only has an effect when the
    /// crate is built with the `dev-auth` feature.
    pub fn with_dev_tokens(mut self, enabled: bool) -> Self {
        self.dev_tokens = enabled && cfg!(feature = "dev-auth");
        if self.dev_tokens {
            tracing::warn!("Development auth tokens are enabled");
        }
        self
    }

    pub fn dev_tokens_enabled(&self) -> bool {
        self.dev_tokens
    }

    /// Sign an access token for `principal`
    pub fn issue_token(&self, principal: &Principal) -> Result<String, AuthError> {
        Ok(generate_access_token(
            principal,
            &self.jwt_secret,
            self.access_token_ttl_seconds,
        )?)
    }

    /// Resolve a bearer token to the caller it names
    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        #[cfg(feature = "dev-auth")]
        if self.dev_tokens {
            if let Some(principal) = super::dev::parse_dev_token(token) {
                return Ok(principal);
            }
        }

        let claims = verify_token(token, &self.jwt_secret)?;
        Ok(claims.principal()?)
    }
}
