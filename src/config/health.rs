//! Health monitoring and pairing configuration

use serde::Deserialize;
use std::time::Duration;

use crate::domain::connection::{HealthPolicy, PairingPolicy};

use super::error::ValidationError;

/// Presence probe schedule
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Consecutive failed probes before the connection is treated as lost
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

impl HealthConfig {
    /// Validate health configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidHealthInterval);
        }
        if self.failure_threshold == 0 {
            return Err(ValidationError::InvalidFailureThreshold);
        }
        if self.probe_timeout_secs == 0 {
            return Err(ValidationError::InvalidProbeTimeout);
        }
        Ok(())
    }

    pub fn policy(&self) -> HealthPolicy {
        HealthPolicy {
            interval: Duration::from_secs(self.interval_secs),
            failure_threshold: self.failure_threshold,
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            failure_threshold: default_failure_threshold(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

/// Pairing-code request handling
#[derive(Debug, Clone, Deserialize)]
pub struct PairingConfig {
    /// Repeat requests inside this window reuse the cached code
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
}

impl PairingConfig {
    pub fn policy(&self) -> PairingPolicy {
        PairingPolicy {
            dedup_window: Duration::from_secs(self.dedup_window_secs),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: default_dedup_window_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_dedup_window_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_domain_policies() {
        assert_eq!(HealthConfig::default().policy(), HealthPolicy::default());
        assert_eq!(PairingConfig::default().policy(), PairingPolicy::default());
    }

    #[test]
    fn test_zero_values_rejected() {
        let interval = HealthConfig {
            interval_secs: 0,
            ..HealthConfig::default()
        };
        assert_eq!(
            interval.validate(),
            Err(ValidationError::InvalidHealthInterval)
        );

        let threshold = HealthConfig {
            failure_threshold: 0,
            ..HealthConfig::default()
        };
        assert_eq!(
            threshold.validate(),
            Err(ValidationError::InvalidFailureThreshold)
        );
    }
}
