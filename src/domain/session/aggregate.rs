//! Session record.
//!
//! One entry per registered session name. The connection handler is the only
//! writer of `status`, `detail` and pairing material (through
//! [`Session::apply`]); the session manager owns token rotation.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::domain::foundation::{ConnectionStatus, OwnerId, SessionName, Timestamp};

use super::StateChange;

/// Mints an opaque random credential (64 hex characters).
pub fn generate_token() -> SecretString {
    SecretString::new(format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    ))
}

/// Constant-time comparison of a stored secret with a presented value.
pub fn tokens_match(stored: &SecretString, presented: &str) -> bool {
    stored
        .expose_secret()
        .as_bytes()
        .ct_eq(presented.as_bytes())
        .into()
}

/// A registered session.
///
/// # Invariants
///
/// - `name` never changes after creation
/// - `qr` and `pairing_code` only hold material from the latest change
#[derive(Debug, Clone)]
pub struct Session {
    name: SessionName,
    owner: OwnerId,
    phone_number: Option<String>,
    status: ConnectionStatus,
    detail: String,
    qr: Option<String>,
    pairing_code: Option<String>,
    access_token: SecretString,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Session {
    /// Creates a session in `Creating` state.
    pub fn new(
        name: SessionName,
        owner: OwnerId,
        phone_number: Option<String>,
        access_token: SecretString,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            name,
            owner,
            phone_number,
            status: ConnectionStatus::Creating,
            detail: "Session created".to_string(),
            qr: None,
            pairing_code: None,
            access_token,
            created_at: now,
            updated_at: now,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn name(&self) -> &SessionName {
        &self.name
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn qr(&self) -> Option<&str> {
        self.qr.as_deref()
    }

    pub fn pairing_code(&self) -> Option<&str> {
        self.pairing_code.as_deref()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Applies a state change reported by the session's connection handler.
    pub fn apply(&mut self, change: &StateChange) {
        self.status = change.status;
        self.detail = change.detail.clone();
        self.qr = change.qr.clone();
        self.pairing_code = change.pairing_code.clone();
        self.updated_at = Timestamp::now();
    }

    /// Replaces the access token, returning the new one.
    pub fn rotate_token(&mut self) -> SecretString {
        self.access_token = generate_token();
        self.updated_at = Timestamp::now();
        self.access_token.clone()
    }

    /// Checks a presented token against the current one.
    pub fn token_matches(&self, presented: &str) -> bool {
        tokens_match(&self.access_token, presented)
    }

    /// Read-only view without the access token.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            name: self.name.clone(),
            owner: self.owner.clone(),
            phone_number: self.phone_number.clone(),
            status: self.status,
            detail: self.detail.clone(),
            qr: self.qr.clone(),
            pairing_code: self.pairing_code.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Serializable session view handed to administrative callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub name: SessionName,
    pub owner: OwnerId,
    pub phone_number: Option<String>,
    pub status: ConnectionStatus,
    pub detail: String,
    pub qr: Option<String>,
    pub pairing_code: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(
            SessionName::new("S1").unwrap(),
            OwnerId::new("alice").unwrap(),
            Some("+15551234".to_string()),
            SecretString::new("token-1".to_string()),
        )
    }

    #[test]
    fn new_session_is_creating() {
        let s = session();
        assert_eq!(s.status(), ConnectionStatus::Creating);
        assert_eq!(s.phone_number(), Some("+15551234"));
        assert!(s.qr().is_none());
    }

    #[test]
    fn apply_replaces_pairing_material() {
        let mut s = session();
        s.apply(
            &StateChange::new(ConnectionStatus::AwaitingPairing, "Enter code")
                .with_pairing_code("ABCD-1234"),
        );
        assert_eq!(s.pairing_code(), Some("ABCD-1234"));

        s.apply(&StateChange::new(ConnectionStatus::Connecting, "Code entered"));
        assert_eq!(s.status(), ConnectionStatus::Connecting);
        assert!(s.pairing_code().is_none());
    }

    #[test]
    fn token_checks_are_exact() {
        let s = session();
        assert!(s.token_matches("token-1"));
        assert!(!s.token_matches("token-2"));
        assert!(!s.token_matches("token-"));
    }

    #[test]
    fn rotate_token_invalidates_previous() {
        let mut s = session();
        let fresh = s.rotate_token();
        assert!(!s.token_matches("token-1"));
        assert!(s.token_matches(fresh.expose_secret()));
    }

    #[test]
    fn generated_tokens_are_long_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.expose_secret().len(), 64);
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn snapshot_serialization_has_no_token() {
        let json = serde_json::to_string(&session().snapshot()).unwrap();
        assert!(!json.contains("token-1"));
        assert!(json.contains("\"status\":\"CREATING\""));
    }
}
