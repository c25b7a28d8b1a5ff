//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `SESSION_GATEWAY` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use session_gateway::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Storing sessions under {}", config.sessions.data_dir.display());
//! ```

mod error;
mod health;
mod logging;
mod reconnect;
mod sessions;
mod webhook;

pub use error::{ConfigError, ValidationError};
pub use health::{HealthConfig, PairingConfig};
pub use logging::{LogFormat, LoggingConfig};
pub use reconnect::ReconnectConfig;
pub use sessions::SessionsConfig;
pub use webhook::WebhookConfig;

use serde::Deserialize;

use crate::application::session::SessionManagerOptions;

/// Root application configuration
///
/// Every section has defaults, so an empty environment yields a runnable
/// gateway. Load using [`AppConfig::load()`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Registry ceiling, data directory and bootstrap token lifetime
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Backoff curve and post-pairing restart window
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Presence probe schedule
    #[serde(default)]
    pub health: HealthConfig,

    /// Pairing-code de-duplication
    #[serde(default)]
    pub pairing: PairingConfig,

    /// Lifecycle webhook delivery
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Tracing output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SESSION_GATEWAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `SESSION_GATEWAY__SESSIONS__MAX_SESSIONS=20` -> `sessions.max_sessions = 20`
    /// - `SESSION_GATEWAY__WEBHOOK__URL=...` -> `webhook.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SESSION_GATEWAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first section that is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.sessions.validate()?;
        self.reconnect.validate()?;
        self.health.validate()?;
        self.webhook.validate()?;
        Ok(())
    }

    /// Options for the session manager derived from the loaded sections.
    pub fn session_manager_options(&self) -> SessionManagerOptions {
        SessionManagerOptions {
            max_sessions: self.sessions.max_sessions,
            ws_token_ttl: self.sessions.ws_token_ttl(),
            reconnect: self.reconnect.policy(),
            health: self.health.policy(),
            pairing: self.pairing.policy(),
        }
    }
}
