//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(&'static str),

    #[error("JWT secret must be at least {0} bytes in production")]
    WeakJwtSecret(usize),

    #[error("Invalid user directory entry: {0}")]
    InvalidUserEntry(String),

    #[error("Rate limit must allow at least one event in a non-empty window")]
    InvalidRateLimit,

    #[error("Notification TTL must be positive")]
    InvalidNotificationTtl,

    #[error("Outbound buffer must hold at least one frame")]
    InvalidOutboundBuffer,
}
