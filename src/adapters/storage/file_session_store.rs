//! File-based Session Store Adapter
//!
//! One directory per session under a base path:
//!
//! ```text
//! <base>/<session>/credentials.json
//! <base>/<session>/settings.yaml
//! ```
//!
//! Session names are storage safe by construction, so they are used as
//! directory names directly. Writes for one session are serialized and each
//! goes through its own temporary file.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::foundation::SessionName;
use crate::domain::session::SessionSettings;
use crate::ports::{CredentialMaterial, SessionStore, StoreError};

const CREDENTIALS_FILE: &str = "credentials.json";
const SETTINGS_FILE: &str = "settings.yaml";

/// File-based storage for session credentials and settings
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_path: PathBuf,
    write_locks: Arc<Mutex<HashMap<SessionName, Arc<Mutex<()>>>>>,
}

impl FileSessionStore {
    /// Create a new file store rooted at `base_path`
    ///
    /// # Example
    /// ```ignore
    /// let store = FileSessionStore::new("./data/sessions");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            write_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn session_dir(&self, session: &SessionName) -> PathBuf {
        self.base_path.join(session.as_str())
    }

    fn credentials_path(&self, session: &SessionName) -> PathBuf {
        self.session_dir(session).join(CREDENTIALS_FILE)
    }

    fn settings_path(&self, session: &SessionName) -> PathBuf {
        self.session_dir(session).join(SETTINGS_FILE)
    }

    async fn write_lock(&self, session: &SessionName) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().await;
        Arc::clone(locks.entry(session.clone()).or_default())
    }

    async fn ensure_dir(&self, path: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| StoreError::IoError(e.to_string()))
    }

    /// Writes through a uniquely named temporary file so a crash never
    /// leaves half a file and concurrent writers never share one.
    async fn write_atomic(&self, path: &Path, contents: String) -> Result<(), StoreError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::IoError(format!("Invalid path: {}", path.display())))?;
        let tmp = path.with_file_name(format!("{}.{}.tmp", file_name, Uuid::new_v4().simple()));

        let written = match fs::write(&tmp, contents).await {
            Ok(()) => fs::rename(&tmp, path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                tracing::debug!(path = %tmp.display(), error = %cleanup, "Temporary file not removed");
            }
            return Err(StoreError::IoError(e.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load_credentials(
        &self,
        session: &SessionName,
    ) -> Result<Option<CredentialMaterial>, StoreError> {
        let path = self.credentials_path(session);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let credentials = serde_json::from_str(&json)
            .map_err(|e| StoreError::DeserializationFailed(e.to_string()))?;
        Ok(Some(credentials))
    }

    async fn save_credentials(
        &self,
        session: &SessionName,
        credentials: &CredentialMaterial,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(credentials)
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;
        let lock = self.write_lock(session).await;
        let _guard = lock.lock().await;
        self.ensure_dir(&self.session_dir(session)).await?;
        self.write_atomic(&self.credentials_path(session), json).await
    }

    async fn load_settings(&self, session: &SessionName) -> Result<SessionSettings, StoreError> {
        let path = self.settings_path(session);
        if !path.exists() {
            return Ok(SessionSettings::default());
        }
        let yaml = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        serde_yaml::from_str(&yaml).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
    }

    async fn has_settings(&self, session: &SessionName) -> Result<bool, StoreError> {
        Ok(self.settings_path(session).exists())
    }

    async fn save_settings(
        &self,
        session: &SessionName,
        settings: &SessionSettings,
    ) -> Result<(), StoreError> {
        let yaml = serde_yaml::to_string(settings)
            .map_err(|e| StoreError::SerializationFailed(e.to_string()))?;
        let lock = self.write_lock(session).await;
        let _guard = lock.lock().await;
        self.ensure_dir(&self.session_dir(session)).await?;
        self.write_atomic(&self.settings_path(session), yaml).await
    }

    async fn list_session_names(&self) -> Result<Vec<SessionName>, StoreError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StoreError::IoError(e.to_string()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::IoError(e.to_string()))?
        {
            if !entry.path().join(CREDENTIALS_FILE).exists() {
                continue;
            }
            let Some(dir_name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            match SessionName::new(dir_name) {
                Ok(name) => names.push(name),
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Skipping unrecognized session directory");
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_session_artifacts(&self, session: &SessionName) -> Result<(), StoreError> {
        let lock = self.write_lock(session).await;
        let _guard = lock.lock().await;
        let dir = self.session_dir(session);
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .await
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        Ok(())
    }
}
