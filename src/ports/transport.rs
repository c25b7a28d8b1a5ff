//! Transport Port - the messaging protocol client behind one session.
//!
//! The transport owns the wire: handshake, encryption, framing. This crate
//! only asks it to open a connection with a set of credentials and then
//! listens to the events it reports.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::connection::DisconnectCause;
use crate::domain::foundation::SessionName;

/// Errors reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Connection is not open")]
    NotOpen,

    #[error("Pairing code request failed: {0}")]
    PairingFailed(String),

    #[error("Presence probe failed: {0}")]
    ProbeFailed(String),

    #[error("Transport error: {0}")]
    Other(String),
}

/// Lifecycle state of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Opaque credential blob. Only the transport understands its contents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialMaterial(pub Value);

impl CredentialMaterial {
    /// Empty credentials; a transport given these starts a fresh pairing.
    pub fn fresh() -> Self {
        Self(Value::Object(Default::default()))
    }

    pub fn is_fresh(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// Who the transport is logged in as, once the connection is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportIdentity {
    pub id: String,
    pub display_name: Option<String>,
}

/// Everything a transport reports about a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Raw QR / pairing material; the user must link the device.
    PairingMaterial(String),
    /// Connection-state transition.
    ConnectionState(ConnectionState),
    /// The connection closed, with whatever cause the transport knows.
    Closed(DisconnectCause),
    /// An application message received on the session.
    Message(Value),
    /// The transport rotated its credentials; they must be persisted.
    CredentialsUpdated(CredentialMaterial),
}

/// Control surface of an established connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Logged-in identity, once known.
    fn identity(&self) -> Option<TransportIdentity>;

    /// Asks the remote side for a pairing code bound to `phone_number`.
    ///
    /// Returns the raw, unformatted code.
    async fn request_pairing_code(&self, phone_number: &str) -> Result<String, TransportError>;

    /// Cheap round trip used by health checks.
    async fn send_presence_probe(&self) -> Result<(), TransportError>;

    /// Closes the connection. Must be safe to call more than once.
    async fn close(&self) -> Result<(), TransportError>;
}

/// A freshly opened connection and the stream of its events.
pub struct TransportConnection {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Port for opening transport connections.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection for `session` with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::ConnectFailed` if the connection could not
    /// even be started.
    async fn connect(
        &self,
        session: &SessionName,
        credentials: CredentialMaterial,
    ) -> Result<TransportConnection, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fresh_credentials_are_detected() {
        assert!(CredentialMaterial::fresh().is_fresh());
        assert!(CredentialMaterial(Value::Null).is_fresh());
        assert!(!CredentialMaterial(json!({"noiseKey": "abc"})).is_fresh());
    }

    #[test]
    fn credentials_serialize_transparently() {
        let creds = CredentialMaterial(json!({"me": {"id": "1@s"}}));
        assert_eq!(serde_json::to_value(&creds).unwrap(), json!({"me": {"id": "1@s"}}));
    }
}
