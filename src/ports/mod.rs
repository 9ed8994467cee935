//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Authentication Ports
//!
//! - `AccessTokenVerifier` - Verifies handshake tokens into identity claims
//! - `UserDirectory` - Confirms the user behind a token still exists
//!
//! ## Delivery Ports
//!
//! - `NotificationStore` - Per-user ordered lists backing the offline queue
//! - `RateLimiter` - Per-connection fixed-window event budget

mod access_token_verifier;
mod notification_store;
mod rate_limiter;
mod user_directory;

pub use access_token_verifier::AccessTokenVerifier;
pub use notification_store::{NotificationStore, StoreError};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitResult, RateLimitStatus, RateLimiter,
};
pub use user_directory::UserDirectory;
