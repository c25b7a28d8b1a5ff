//! Session notifications.
//!
//! Payloads that leave the core whenever a session changes:
//! - `StateChange` - produced by a connection handler, applied to the registry
//! - `SessionStateChanged` - broadcast to dashboards after every applied change
//! - `SessionDeleted` - broadcast once a session is torn down
//! - `PairingUpdate` - a freshly issued pairing code for the end user
//! - `WebhookEvent` - lifecycle notification for the webhook collaborator
//! - `InboundMessage` - application message forwarded unmodified

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::foundation::{ConnectionStatus, SessionName, Timestamp};

// ════════════════════════════════════════════════════════════════════════════
// StateChange
// ════════════════════════════════════════════════════════════════════════════

/// A requested status transition with the facts that go with it.
///
/// Pairing material is carried in full on every change; a change without
/// `qr` or `pairing_code` clears whatever the session held before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub status: ConnectionStatus,
    pub detail: String,
    pub qr: Option<String>,
    pub pairing_code: Option<String>,
    pub reason: Option<String>,
}

impl StateChange {
    pub fn new(status: ConnectionStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            qr: None,
            pairing_code: None,
            reason: None,
        }
    }

    pub fn with_qr(mut self, qr: impl Into<String>) -> Self {
        self.qr = Some(qr.into());
        self
    }

    pub fn with_pairing_code(mut self, code: impl Into<String>) -> Self {
        self.pairing_code = Some(code.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Broadcast payloads
// ════════════════════════════════════════════════════════════════════════════

/// Broadcast after every applied state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateChanged {
    pub session_name: SessionName,
    pub status: ConnectionStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: Timestamp,
}

impl SessionStateChanged {
    pub fn from_change(session_name: SessionName, change: &StateChange) -> Self {
        Self {
            session_name,
            status: change.status,
            detail: change.detail.clone(),
            qr: change.qr.clone(),
            pairing_code: change.pairing_code.clone(),
            reason: change.reason.clone(),
            timestamp: Timestamp::now(),
        }
    }
}

/// Broadcast once a session has been removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDeleted {
    pub session_name: SessionName,
    pub timestamp: Timestamp,
}

/// A pairing code the end user must type on their phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingUpdate {
    pub session_name: SessionName,
    pub phone_number: String,
    pub pairing_code: String,
    pub timestamp: Timestamp,
}

// ════════════════════════════════════════════════════════════════════════════
// Webhook payloads
// ════════════════════════════════════════════════════════════════════════════

/// Lifecycle notifications offered to the webhook collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookEventKind {
    Connected,
    Connecting,
    Disconnected,
    PairingSuccess,
    FatalDisconnect,
    HealthCheckFailed,
    ReconnectionAttempt,
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventKind::Connected => "connected",
            WebhookEventKind::Connecting => "connecting",
            WebhookEventKind::Disconnected => "disconnected",
            WebhookEventKind::PairingSuccess => "pairing-success",
            WebhookEventKind::FatalDisconnect => "fatal-disconnect",
            WebhookEventKind::HealthCheckFailed => "health-check-failed",
            WebhookEventKind::ReconnectionAttempt => "reconnection-attempt",
        }
    }

    /// Kinds that report a state rather than an occurrence. Only these are
    /// collapsed when the same one repeats back to back.
    pub fn suppresses_repeats(&self) -> bool {
        matches!(
            self,
            WebhookEventKind::Connected
                | WebhookEventKind::Connecting
                | WebhookEventKind::Disconnected
        )
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `{event, sessionName, timestamp, ...details}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event: WebhookEventKind,
    pub session_name: SessionName,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl WebhookEvent {
    pub fn new(event: WebhookEventKind, session_name: SessionName) -> Self {
        Self {
            event,
            session_name,
            timestamp: Timestamp::now(),
            details: Map::new(),
        }
    }

    /// Adds one detail field; `None`-like values are stored as JSON null.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Identity used to suppress consecutive duplicates (timestamp excluded).
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.event, Value::Object(self.details.clone()))
    }
}

/// Application message received on a session, forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub session_name: SessionName,
    pub payload: Value,
    pub received_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn name() -> SessionName {
        SessionName::new("S1").unwrap()
    }

    #[test]
    fn webhook_event_flattens_details() {
        let event = WebhookEvent::new(WebhookEventKind::PairingSuccess, name())
            .with_detail("phoneNumber", "+15551234")
            .with_detail("attempt", 2);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["event"], "pairing-success");
        assert_eq!(value["sessionName"], "S1");
        assert_eq!(value["phoneNumber"], "+15551234");
        assert_eq!(value["attempt"], 2);
    }

    #[test]
    fn fingerprint_ignores_timestamp_but_not_details() {
        let a = WebhookEvent::new(WebhookEventKind::Disconnected, name()).with_detail("code", 408);
        let mut b = a.clone();
        b.timestamp = Timestamp::now();
        let c = WebhookEvent::new(WebhookEventKind::Disconnected, name()).with_detail("code", 428);

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn only_state_kinds_suppress_repeats() {
        assert!(WebhookEventKind::Connected.suppresses_repeats());
        assert!(WebhookEventKind::Disconnected.suppresses_repeats());
        assert!(!WebhookEventKind::HealthCheckFailed.suppresses_repeats());
        assert!(!WebhookEventKind::ReconnectionAttempt.suppresses_repeats());
    }

    #[test]
    fn state_changed_omits_absent_pairing_material() {
        let change = StateChange::new(ConnectionStatus::Connected, "Connected");
        let value = serde_json::to_value(SessionStateChanged::from_change(name(), &change)).unwrap();

        assert_eq!(value["status"], "CONNECTED");
        assert!(value.get("qr").is_none());
        assert!(value.get("pairingCode").is_none());
    }

    #[test]
    fn state_change_builder_sets_material() {
        let change = StateChange::new(ConnectionStatus::AwaitingPairing, "Enter code")
            .with_pairing_code("ABCD-1234")
            .with_reason("pairing");
        assert_eq!(change.pairing_code.as_deref(), Some("ABCD-1234"));
        assert_eq!(change.reason.as_deref(), Some("pairing"));
        assert!(change.qr.is_none());
        assert_eq!(json!(WebhookEventKind::HealthCheckFailed), json!("health-check-failed"));
    }
}
