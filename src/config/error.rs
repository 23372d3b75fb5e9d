//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("freshness window must be greater than zero")]
    InvalidFreshnessWindow,

    #[error("deduplication cache capacity must be greater than zero")]
    InvalidDedupCapacity,

    #[error("deduplication retention must be at least the freshness window")]
    RetentionShorterThanFreshnessWindow,

    #[error("invalid port number")]
    InvalidPort,

    #[error("external hostname must not be empty")]
    MissingHostname,
}
