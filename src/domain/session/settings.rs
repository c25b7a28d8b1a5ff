//! Per-session settings persisted alongside credentials.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::OwnerId;

use super::WebhookEventKind;

/// Settings loaded when a session is created or replayed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Identity that created the session; reused on replay.
    #[serde(default)]
    pub owner: Option<OwnerId>,

    /// Overrides the globally configured webhook target.
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Lifecycle events to dispatch. Empty means all.
    #[serde(default)]
    pub webhook_events: Vec<WebhookEventKind>,
}

impl SessionSettings {
    /// True if this session wants `kind` dispatched.
    pub fn wants(&self, kind: WebhookEventKind) -> bool {
        self.webhook_events.is_empty() || self.webhook_events.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_wants_everything() {
        let settings = SessionSettings::default();
        assert!(settings.wants(WebhookEventKind::Connected));
        assert!(settings.wants(WebhookEventKind::HealthCheckFailed));
    }

    #[test]
    fn filter_limits_dispatched_kinds() {
        let settings = SessionSettings {
            webhook_events: vec![WebhookEventKind::FatalDisconnect],
            ..Default::default()
        };
        assert!(settings.wants(WebhookEventKind::FatalDisconnect));
        assert!(!settings.wants(WebhookEventKind::Connecting));
    }

    #[test]
    fn yaml_with_missing_fields_uses_defaults() {
        let settings: SessionSettings = serde_yaml::from_str("owner: alice\n").unwrap();
        assert_eq!(settings.owner.unwrap().as_str(), "alice");
        assert!(settings.webhook_url.is_none());
        assert!(settings.webhook_events.is_empty());
    }
}
