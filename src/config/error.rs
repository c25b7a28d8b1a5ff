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
    #[error("Session ceiling must be at least 1")]
    ZeroSessionCeiling,

    #[error("WebSocket token TTL must be positive")]
    InvalidWsTokenTtl,

    #[error("Backoff factor must be at least 1")]
    InvalidBackoffFactor,

    #[error("Initial reconnect delay must be positive")]
    InvalidInitialDelay,

    #[error("Maximum reconnect delay is below the initial delay")]
    MaxDelayBelowInitial,

    #[error("Health check interval must be positive")]
    InvalidHealthInterval,

    #[error("Health failure threshold must be at least 1")]
    InvalidFailureThreshold,

    #[error("Health probe timeout must be positive")]
    InvalidProbeTimeout,

    #[error("Webhook URL must use http or https")]
    InvalidWebhookUrl,

    #[error("Webhook timeout must be between 1 and 300 seconds")]
    InvalidWebhookTimeout,

    #[error("Webhook queue capacity must be at least 1")]
    InvalidQueueCapacity,
}
