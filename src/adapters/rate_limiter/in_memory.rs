//! In-memory rate limiter implementation.
//!
//! Uses a fixed-window counter per connection held in a HashMap. Connections
//! live on exactly one gateway process, so no shared backend is needed.
//! Entries are removed on disconnect through [`RateLimiter::reset`]; there is
//! no background sweep.

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{ConnectionId, Timestamp};
use crate::ports::{RateLimitDenied, RateLimitError, RateLimitResult, RateLimitStatus, RateLimiter};

use super::config::RateLimitConfig;

/// In-memory fixed-window rate limiter.
#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    windows: Arc<RwLock<HashMap<ConnectionId, WindowState>>>,
}

/// State for a single connection's window.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    /// Events accepted in the current window.
    count: u32,
    /// The window ends strictly after this instant.
    reset_at: Timestamp,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a rate limiter with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RateLimitConfig::default())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of connections with a live window entry.
    pub async fn tracked_connections(&self) -> usize {
        self.windows.read().await.len()
    }

    /// Check-and-consume evaluated at `now`.
    pub async fn check_at(&self, connection_id: ConnectionId, now: Timestamp) -> RateLimitResult {
        let limit = self.config.max_events;
        let window_secs = self.config.window_secs;
        let fresh = WindowState {
            count: 1,
            reset_at: now.plus_secs(u64::from(window_secs)),
        };

        let mut windows = self.windows.write().await;
        let state = match windows.entry(connection_id) {
            Entry::Vacant(slot) => {
                let state = slot.insert(fresh);
                return RateLimitResult::Allowed(self.status_of(state));
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if now.is_after(&state.reset_at) {
            *state = fresh;
            return RateLimitResult::Allowed(self.status_of(state));
        }

        if state.count >= limit {
            let retry_after = retry_after_secs(now, state.reset_at);
            return RateLimitResult::Denied(RateLimitDenied {
                limit,
                retry_after_secs: retry_after,
                message: format!(
                    "Rate limit exceeded. Retry after {} seconds.",
                    retry_after
                ),
            });
        }

        state.count += 1;
        RateLimitResult::Allowed(self.status_of(state))
    }

    fn status_of(&self, state: &WindowState) -> RateLimitStatus {
        RateLimitStatus {
            limit: self.config.max_events,
            used: state.count,
            remaining: self.config.max_events.saturating_sub(state.count),
            reset_at: state.reset_at,
            window_secs: self.config.window_secs,
        }
    }
}

fn retry_after_secs(now: Timestamp, reset_at: Timestamp) -> u32 {
    let millis = (reset_at.as_unix_millis() - now.as_unix_millis()).max(0);
    let secs = (millis + 999) / 1000;
    u32::try_from(secs).unwrap_or(u32::MAX).max(1)
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, connection_id: ConnectionId) -> Result<RateLimitResult, RateLimitError> {
        Ok(self.check_at(connection_id, Timestamp::now()).await)
    }

    async fn reset(&self, connection_id: ConnectionId) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(&connection_id);
        Ok(())
    }
}
