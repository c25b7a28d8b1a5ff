//! Session registry configuration

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ValidationError;

/// Registry limits and durable storage location
#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Maximum concurrently registered sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Root directory for per-session credentials and settings
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Lifetime of WebSocket bootstrap tokens in seconds
    #[serde(default = "default_ws_token_ttl")]
    pub ws_token_ttl_secs: u64,
}

impl SessionsConfig {
    pub fn ws_token_ttl(&self) -> Duration {
        Duration::from_secs(self.ws_token_ttl_secs)
    }

    /// Validate registry configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_sessions == 0 {
            return Err(ValidationError::ZeroSessionCeiling);
        }
        if self.ws_token_ttl_secs == 0 {
            return Err(ValidationError::InvalidWsTokenTtl);
        }
        Ok(())
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            data_dir: default_data_dir(),
            ws_token_ttl_secs: default_ws_token_ttl(),
        }
    }
}

fn default_max_sessions() -> usize {
    10
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./sessions")
}

fn default_ws_token_ttl() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sessions_config_defaults() {
        let config = SessionsConfig::default();
        assert_eq!(config.max_sessions, 10);
        assert_eq!(config.data_dir, PathBuf::from("./sessions"));
        assert_eq!(config.ws_token_ttl(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let config = SessionsConfig {
            max_sessions: 0,
            ..SessionsConfig::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::ZeroSessionCeiling));
    }
}
