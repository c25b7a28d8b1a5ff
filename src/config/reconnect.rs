//! Reconnect backoff configuration

use serde::Deserialize;
use std::time::Duration;

use crate::domain::connection::ReconnectPolicy;

use super::error::ValidationError;

/// Backoff curve and post-pairing restart tunables
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_factor")]
    pub factor: u32,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Scheduled attempts before the session is given up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How long after a pairing code is entered a restart is expected
    #[serde(default = "default_post_pairing_window_ms")]
    pub post_pairing_window_ms: u64,

    #[serde(default)]
    pub post_pairing_delay_ms: u64,
}

impl ReconnectConfig {
    /// Validate reconnect configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.factor < 1 {
            return Err(ValidationError::InvalidBackoffFactor);
        }
        if self.initial_delay_ms == 0 {
            return Err(ValidationError::InvalidInitialDelay);
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::MaxDelayBelowInitial);
        }
        Ok(())
    }

    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            factor: self.factor,
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            post_pairing_window: Duration::from_millis(self.post_pairing_window_ms),
            post_pairing_delay: Duration::from_millis(self.post_pairing_delay_ms),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            factor: default_factor(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            post_pairing_window_ms: default_post_pairing_window_ms(),
            post_pairing_delay_ms: 0,
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    5_000
}

fn default_factor() -> u32 {
    2
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_post_pairing_window_ms() -> u64 {
    10_000
}
