//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, the role hierarchy and error types
//! that the real-time modules build on.

mod auth;
mod errors;
mod ids;
mod role;
mod timestamp;

pub use auth::{AccessClaims, AuthError, AuthenticatedUser};
pub use errors::ValidationError;
pub use ids::{ConnectionId, UserId};
pub use role::Role;
pub use timestamp::Timestamp;
