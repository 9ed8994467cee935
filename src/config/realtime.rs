//! Realtime gateway tuning

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Limits and timeouts for the connection gateway
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Events allowed per connection per window
    #[serde(default = "default_rate_limit_max_events")]
    pub rate_limit_max_events: u32,

    /// Rate limit window length in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u32,

    /// Lifetime of an offline user's queue in seconds
    #[serde(default = "default_notification_ttl_secs")]
    pub notification_ttl_secs: u64,

    /// Upper bound for one queue store call in milliseconds
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Frames buffered per connection before new ones are dropped
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl RealtimeConfig {
    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.rate_limit_max_events == 0 || self.rate_limit_window_secs == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        if self.notification_ttl_secs == 0 {
            return Err(ValidationError::InvalidNotificationTtl);
        }
        if self.store_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout("realtime.store_timeout_ms"));
        }
        if self.outbound_buffer == 0 {
            return Err(ValidationError::InvalidOutboundBuffer);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            rate_limit_max_events: default_rate_limit_max_events(),
            rate_limit_window_secs: default_rate_limit_window_secs(),
            notification_ttl_secs: default_notification_ttl_secs(),
            store_timeout_ms: default_store_timeout_ms(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_rate_limit_max_events() -> u32 {
    100
}

fn default_rate_limit_window_secs() -> u32 {
    60
}

fn default_notification_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_outbound_buffer() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.rate_limit_max_events, 100);
        assert_eq!(config.rate_limit_window_secs, 60);
        assert_eq!(config.notification_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.store_timeout(), Duration::from_millis(2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let config = RealtimeConfig {
            rate_limit_max_events: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidRateLimit));

        let config = RealtimeConfig {
            outbound_buffer: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidOutboundBuffer));
    }
}
