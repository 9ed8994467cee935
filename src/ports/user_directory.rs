//! User directory port.
//!
//! A verified token only proves who the caller was when it was issued. The
//! gateway looks the user up again so deleted accounts cannot connect.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser, UserId};

/// Looks up users by id.
///
/// # Contract
///
/// Implementations must:
/// - Return `Ok(None)` if no user exists with this id
/// - Return `AuthError::ServiceUnavailable` for transient errors
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_id(&self, user_id: &UserId)
        -> Result<Option<AuthenticatedUser>, AuthError>;
}
