//! Rate limit configuration types.

use serde::{Deserialize, Serialize};

/// Fixed-window limits applied to every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum events accepted per window.
    pub max_events: u32,
    /// Window duration in seconds.
    pub window_secs: u32,
}

impl RateLimitConfig {
    pub fn new(max_events: u32, window_secs: u32) -> Self {
        Self {
            max_events,
            window_secs,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_events: 100,
            window_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_100_events_per_minute() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_events, 100);
        assert_eq!(config.window_secs, 60);
    }
}
