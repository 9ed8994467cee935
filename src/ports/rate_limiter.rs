//! Rate limiting port for inbound connection events.
//!
//! Every event a connection sends consumes one unit of its budget before it
//! is dispatched. Limits are per connection, not per user, so one noisy tab
//! cannot starve the user's other sessions.

use async_trait::async_trait;

use crate::domain::foundation::{ConnectionId, Timestamp};

/// Port for rate limiting operations.
///
/// Implementations should be thread-safe and support concurrent access.
/// The rate limiter uses a fixed-window counter algorithm.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if an event is allowed, consuming a unit if so.
    ///
    /// Returns `Allowed` with remaining quota or `Denied` with retry info.
    /// A denied check does not consume anything.
    async fn check(&self, connection_id: ConnectionId) -> Result<RateLimitResult, RateLimitError>;

    /// Forget the connection's window. Called on disconnect.
    async fn reset(&self, connection_id: ConnectionId) -> Result<(), RateLimitError>;
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Event is allowed; includes current status.
    Allowed(RateLimitStatus),
    /// Event is denied; includes denial details.
    Denied(RateLimitDenied),
}

impl RateLimitResult {
    /// Returns true if the event was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed(_))
    }

    /// Returns true if the event was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied(_))
    }
}

/// Current rate limit status.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitStatus {
    /// Maximum events allowed in the window.
    pub limit: u32,
    /// Events consumed in the current window.
    pub used: u32,
    /// Remaining events in the current window.
    pub remaining: u32,
    /// When the current window resets.
    pub reset_at: Timestamp,
    /// Window duration in seconds.
    pub window_secs: u32,
}

/// Details of a rate limit denial.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDenied {
    /// Maximum events allowed in the window.
    pub limit: u32,
    /// Seconds until the window resets.
    pub retry_after_secs: u32,
    /// Human-readable message explaining the denial.
    pub message: String,
}

/// Errors that can occur during rate limiting operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Rate limiter backend is unavailable.
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}
