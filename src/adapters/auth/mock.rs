//! Mock authentication adapters for testing.
//!
//! These adapters implement the `AccessTokenVerifier` and `UserDirectory`
//! ports without a real token issuer or user database. The binary also uses
//! `InMemoryUserDirectory` when no external directory is configured.
//!
//! # Example
//!
//! ```ignore
//! let alice = AuthenticatedUser::new(UserId::new("alice").unwrap(), "alice", Role::User);
//! let verifier = MockAccessTokenVerifier::new().with_user("alice-token", &alice);
//! let directory = InMemoryUserDirectory::new().with_user(alice);
//! ```

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::foundation::{AccessClaims, AuthError, AuthenticatedUser, Role, UserId};
use crate::ports::{AccessTokenVerifier, UserDirectory};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock token verifier for testing.
///
/// Stores a map of tokens to claims. Tokens not in the map return `InvalidToken`.
#[derive(Debug, Default)]
pub struct MockAccessTokenVerifier {
    /// Map of valid tokens to their claims
    tokens: RwLock<HashMap<String, AccessClaims>>,
    /// Optional error to return for all verifications (for error testing)
    force_error: RwLock<Option<AuthError>>,
}

impl MockAccessTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a valid token that maps to the user's id and role.
    pub fn with_user(self, token: impl Into<String>, user: &AuthenticatedUser) -> Self {
        self.add_token(
            token,
            AccessClaims {
                user_id: user.id.clone(),
                role: user.role.clone(),
            },
        );
        self
    }

    /// Adds a valid token with explicit claims.
    pub fn with_claims(self, token: impl Into<String>, claims: AccessClaims) -> Self {
        self.add_token(token, claims);
        self
    }

    /// Forces all verifications to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *write(&self.force_error) = Some(error);
        self
    }

    /// Clears the forced error and returns to normal operation.
    pub fn clear_error(&self) {
        *write(&self.force_error) = None;
    }

    /// Registers a new valid token at runtime.
    pub fn add_token(&self, token: impl Into<String>, claims: AccessClaims) {
        write(&self.tokens).insert(token.into(), claims);
    }

    /// Removes a token, making it invalid.
    pub fn remove_token(&self, token: &str) {
        write(&self.tokens).remove(token);
    }
}

#[async_trait]
impl AccessTokenVerifier for MockAccessTokenVerifier {
    async fn verify_access_token(&self, token: &str) -> Result<AccessClaims, AuthError> {
        if let Some(error) = read(&self.force_error).clone() {
            return Err(error);
        }
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        read(&self.tokens)
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

/// In-memory user directory.
///
/// Unknown ids resolve to `None`.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, AuthenticatedUser>>,
    force_error: RwLock<Option<AuthError>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user to the directory.
    pub fn with_user(self, user: AuthenticatedUser) -> Self {
        self.add_user(user);
        self
    }

    /// Adds a user with the given id and role, using the id as username.
    pub fn with_test_user(self, user_id: UserId, role: Role) -> Self {
        let username = user_id.as_str().to_string();
        self.with_user(AuthenticatedUser::new(user_id, username, role))
    }

    /// Forces all lookups to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        *write(&self.force_error) = Some(error);
        self
    }

    /// Clears the forced error.
    pub fn clear_error(&self) {
        *write(&self.force_error) = None;
    }

    /// Adds a user at runtime.
    pub fn add_user(&self, user: AuthenticatedUser) {
        write(&self.users).insert(user.id.clone(), user);
    }

    /// Removes a user.
    pub fn remove_user(&self, user_id: &UserId) {
        write(&self.users).remove(user_id);
    }

    /// Returns the number of registered users.
    pub fn user_count(&self) -> usize {
        read(&self.users).len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user_by_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<AuthenticatedUser>, AuthError> {
        if let Some(error) = read(&self.force_error).clone() {
            return Err(error);
        }
        Ok(read(&self.users).get(user_id).cloned())
    }
}
