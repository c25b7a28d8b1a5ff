//! Session Store Port - durable credentials and settings per session.

use async_trait::async_trait;

use crate::domain::foundation::SessionName;
use crate::domain::session::SessionSettings;

use super::CredentialMaterial;

/// Errors from session storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to serialize: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Port for persisting everything a session needs to survive a restart.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads stored credentials, `None` if the session never paired.
    async fn load_credentials(
        &self,
        session: &SessionName,
    ) -> Result<Option<CredentialMaterial>, StoreError>;

    /// Overwrites stored credentials.
    async fn save_credentials(
        &self,
        session: &SessionName,
        credentials: &CredentialMaterial,
    ) -> Result<(), StoreError>;

    /// Loads settings, falling back to defaults if none were saved.
    async fn load_settings(&self, session: &SessionName) -> Result<SessionSettings, StoreError>;

    /// Returns true if settings were saved for this session.
    async fn has_settings(&self, session: &SessionName) -> Result<bool, StoreError>;

    /// Overwrites stored settings.
    async fn save_settings(
        &self,
        session: &SessionName,
        settings: &SessionSettings,
    ) -> Result<(), StoreError>;

    /// Names of every session with stored credentials, sorted.
    async fn list_session_names(&self) -> Result<Vec<SessionName>, StoreError>;

    /// Removes every artifact of a session. Missing artifacts are not an error.
    async fn delete_session_artifacts(&self, session: &SessionName) -> Result<(), StoreError>;
}
