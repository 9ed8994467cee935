//! Access token verification port.
//!
//! The gateway calls this once per connection handshake, before anything is
//! registered. Implementations exist for HS256 JWTs and for tests.
//!
//! # Example Implementation
//!
//! ```ignore
//! pub struct JwtAccessTokenVerifier { ... }
//!
//! #[async_trait]
//! impl AccessTokenVerifier for JwtAccessTokenVerifier {
//!     async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
//!         // 1. Check signature and expiry
//!         // 2. Map `sub` and `role` into AccessClaims
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::domain::foundation::{AccessClaims, AuthError};

/// Verifies access tokens and extracts the caller's identity claims.
///
/// # Contract
///
/// Implementations must:
/// - Return `AuthError::InvalidToken` for malformed tokens or bad signatures
/// - Return `AuthError::TokenExpired` for expired tokens
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait AccessTokenVerifier: Send + Sync {
    /// Verify a raw token (without any "Bearer " prefix).
    async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Role, UserId};

    struct FixedVerifier;

    #[async_trait]
    impl AccessTokenVerifier for FixedVerifier {
        async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
            if token == "good" {
                Ok(AccessClaims {
                    user_id: UserId::new("u1").unwrap(),
                    role: Role::User,
                })
            } else {
                Err(AuthError::InvalidToken)
            }
        }
    }

    #[tokio::test]
    async fn trait_is_object_safe() {
        let verifier: Box<dyn AccessTokenVerifier> = Box::new(FixedVerifier);
        assert!(verifier.verify_access_token("good").await.is_ok());
        assert_eq!(
            verifier.verify_access_token("bad").await.unwrap_err(),
            AuthError::InvalidToken
        );
    }
}
