//! Webhook delivery configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::adapters::webhook::HttpWebhookConfig;

use super::error::ValidationError;

/// Global webhook target and signing secret
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Default delivery URL; sessions may override it in their settings
    pub url: Option<String>,

    /// HMAC-SHA256 signing secret
    pub secret: Option<SecretString>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl WebhookConfig {
    /// Validate webhook configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidWebhookUrl);
            }
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidWebhookTimeout);
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        Ok(())
    }

    /// True if a global target is configured.
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    pub fn http_config(&self) -> HttpWebhookConfig {
        let mut config = HttpWebhookConfig::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_queue_capacity(self.queue_capacity);
        if let Some(url) = &self.url {
            config = config.with_url(url.clone());
        }
        if let Some(secret) = &self.secret {
            config = config.with_secret(secret.expose_secret().clone());
        }
        config
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            timeout_secs: default_timeout_secs(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_by_default() {
        let config = WebhookConfig::default();
        assert!(!config.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_http_url_rejected() {
        let config = WebhookConfig {
            url: Some("ftp://hooks.example.com".into()),
            ..WebhookConfig::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWebhookUrl));
    }

    #[test]
    fn test_http_config_carries_target() {
        let config = WebhookConfig {
            url: Some("https://hooks.example.com/gw".into()),
            timeout_secs: 3,
            ..WebhookConfig::default()
        };
        let http = config.http_config();
        assert_eq!(http.url.as_deref(), Some("https://hooks.example.com/gw"));
        assert_eq!(http.timeout, Duration::from_secs(3));
        assert_eq!(http.queue_capacity, 256);
    }
}
