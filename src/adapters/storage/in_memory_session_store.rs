//! In-Memory Session Store Adapter
//!
//! Keeps credentials and settings in memory. Useful for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::SessionName;
use crate::domain::session::SessionSettings;
use crate::ports::{CredentialMaterial, SessionStore, StoreError};

/// In-memory storage for session credentials and settings
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    credentials: Arc<RwLock<HashMap<SessionName, CredentialMaterial>>>,
    settings: Arc<RwLock<HashMap<SessionName, SessionSettings>>>,
    next_save_delay: Arc<Mutex<Option<Duration>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with stored credentials
    pub async fn credential_count(&self) -> usize {
        self.credentials.read().await.len()
    }

    /// Makes the next credential save wait `delay` before it lands.
    pub async fn delay_next_credential_save(&self, delay: Duration) {
        *self.next_save_delay.lock().await = Some(delay);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_credentials(
        &self,
        session: &SessionName,
    ) -> Result<Option<CredentialMaterial>, StoreError> {
        Ok(self.credentials.read().await.get(session).cloned())
    }

    async fn save_credentials(
        &self,
        session: &SessionName,
        credentials: &CredentialMaterial,
    ) -> Result<(), StoreError> {
        let delay = self.next_save_delay.lock().await.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.credentials
            .write()
            .await
            .insert(session.clone(), credentials.clone());
        Ok(())
    }

    async fn load_settings(&self, session: &SessionName) -> Result<SessionSettings, StoreError> {
        Ok(self
            .settings
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default())
    }

    async fn has_settings(&self, session: &SessionName) -> Result<bool, StoreError> {
        Ok(self.settings.read().await.contains_key(session))
    }

    async fn save_settings(
        &self,
        session: &SessionName,
        settings: &SessionSettings,
    ) -> Result<(), StoreError> {
        self.settings
            .write()
            .await
            .insert(session.clone(), settings.clone());
        Ok(())
    }

    async fn list_session_names(&self) -> Result<Vec<SessionName>, StoreError> {
        let mut names: Vec<SessionName> = self.credentials.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete_session_artifacts(&self, session: &SessionName) -> Result<(), StoreError> {
        self.credentials.write().await.remove(session);
        self.settings.write().await.remove(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_clears_credentials_and_settings() {
        let store = InMemorySessionStore::new();
        let name = SessionName::new("S1").unwrap();
        store
            .save_credentials(&name, &CredentialMaterial::fresh())
            .await
            .unwrap();
        store
            .save_settings(&name, &SessionSettings::default())
            .await
            .unwrap();

        store.delete_session_artifacts(&name).await.unwrap();

        assert_eq!(store.credential_count().await, 0);
        assert!(!store.has_settings(&name).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_save_only_applies_once() {
        let store = InMemorySessionStore::new();
        let name = SessionName::new("S1").unwrap();
        store
            .delay_next_credential_save(Duration::from_millis(50))
            .await;

        let started = tokio::time::Instant::now();
        store
            .save_credentials(&name, &CredentialMaterial::fresh())
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        store
            .save_credentials(&name, &CredentialMaterial::fresh())
            .await
            .unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
