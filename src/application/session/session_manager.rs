//! SessionManager - registry of every live session.
//!
//! Owns session records and tokens, creates and tears down the
//! socket/handler pair per session, and is the single place session state
//! reaches external observers from.

use secrecy::SecretString;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::application::connection::{
    ConnectionHandler, ReconnectStrategy, SessionObserver, SocketManager, SocketState,
};
use crate::domain::connection::{HealthPolicy, HealthStatus, PairingPolicy, ReconnectPolicy};
use crate::domain::foundation::{ConnectionStatus, OwnerId, SessionName, Timestamp};
use crate::domain::session::{
    generate_token, Session, SessionDeleted, SessionError, SessionSettings, SessionSnapshot,
    SessionStateChanged, StateChange,
};
use crate::ports::{
    PairingNotifier, SessionStore, StateBroadcaster, StoreError, Transport, WebhookDispatcher,
};

use super::registry::{Registry, RegistryObserver, SessionEntry, SessionRuntime};
use super::ws_tokens::{WsTokenStore, DEFAULT_WS_TOKEN_TTL};

/// Default ceiling on concurrently registered sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10;

/// Tunables handed to the manager and on to each session.
#[derive(Debug, Clone)]
pub struct SessionManagerOptions {
    pub max_sessions: usize,
    pub ws_token_ttl: Duration,
    pub reconnect: ReconnectPolicy,
    pub health: HealthPolicy,
    pub pairing: PairingPolicy,
}

impl Default for SessionManagerOptions {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            ws_token_ttl: DEFAULT_WS_TOKEN_TTL,
            reconnect: ReconnectPolicy::default(),
            health: HealthPolicy::default(),
            pairing: PairingPolicy::default(),
        }
    }
}

/// A newly created session and its access token.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: SessionSnapshot,
    pub access_token: SecretString,
}

/// Everything known about one session's connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDiagnostics {
    pub session: SessionSnapshot,
    pub socket: Option<SocketState>,
    pub health: Option<HealthStatus>,
    pub reconnect_attempts: u32,
}

fn storage_error(e: StoreError) -> SessionError {
    SessionError::Storage(e.to_string())
}

/// Registry of sessions and their connection runtimes.
pub struct SessionManager {
    options: SessionManagerOptions,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    broadcaster: Arc<dyn StateBroadcaster>,
    registry: Arc<Registry>,
    observer: Arc<RegistryObserver>,
    reconnect: Arc<ReconnectStrategy>,
    ws_tokens: WsTokenStore,
}

impl SessionManager {
    pub fn new(
        options: SessionManagerOptions,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        webhooks: Arc<dyn WebhookDispatcher>,
        broadcaster: Arc<dyn StateBroadcaster>,
        pairing_notifier: Arc<dyn PairingNotifier>,
    ) -> Self {
        let registry: Arc<Registry> = Arc::new(RwLock::new(HashMap::new()));
        let observer = Arc::new(RegistryObserver::new(
            Arc::clone(&registry),
            Arc::clone(&broadcaster),
            webhooks,
            pairing_notifier,
        ));
        Self {
            reconnect: Arc::new(ReconnectStrategy::new(options.reconnect.clone())),
            ws_tokens: WsTokenStore::new(options.ws_token_ttl),
            options,
            transport,
            store,
            broadcaster,
            registry,
            observer,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// Registers a new session and starts connecting it.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if the name is not storage safe
    /// - `DuplicateSession` if the name is taken
    /// - `CeilingReached` if the session limit is reached
    /// - `TransportInitFailed` if the transport could not be started; the
    ///   session stays registered in `Error` state
    pub async fn create_session(
        &self,
        name: &str,
        owner: OwnerId,
        phone_number: Option<String>,
    ) -> Result<CreatedSession, SessionError> {
        let name = SessionName::new(name)?;
        self.check_capacity(&name).await?;

        let has_settings = self.store.has_settings(&name).await.map_err(storage_error)?;
        let mut settings = self.store.load_settings(&name).await.map_err(storage_error)?;
        if !has_settings || settings.owner.is_none() {
            settings.owner.get_or_insert_with(|| owner.clone());
            self.store
                .save_settings(&name, &settings)
                .await
                .map_err(storage_error)?;
        }

        self.register(name, owner, phone_number, settings).await
    }

    async fn register(
        &self,
        name: SessionName,
        owner: OwnerId,
        phone_number: Option<String>,
        settings: SessionSettings,
    ) -> Result<CreatedSession, SessionError> {
        let access_token = generate_token();
        {
            let mut registry = self.registry.write().await;
            if registry.contains_key(&name) {
                return Err(SessionError::DuplicateSession(name));
            }
            if registry.len() >= self.options.max_sessions {
                return Err(SessionError::CeilingReached {
                    max: self.options.max_sessions,
                });
            }
            let session = Session::new(
                name.clone(),
                owner,
                phone_number.clone(),
                access_token.clone(),
            );
            registry.insert(
                name.clone(),
                SessionEntry {
                    session,
                    settings,
                    runtime: None,
                    last_webhook: None,
                },
            );
        }

        tracing::info!(session = %name, pairing = phone_number.is_some(), "Session created");
        self.broadcaster.state_changed(SessionStateChanged::from_change(
            name.clone(),
            &StateChange::new(ConnectionStatus::Creating, "Session created"),
        ));

        self.connect_session(name.as_str(), phone_number).await?;

        let session = self
            .get_session(name.as_str())
            .await
            .ok_or_else(|| SessionError::not_found(name.as_str()))?;
        Ok(CreatedSession {
            session,
            access_token,
        })
    }

    /// Builds a fresh socket/handler pair for a registered session, opens
    /// the transport and attaches the handler.
    ///
    /// A pair that already exists for the session is torn down first. On
    /// failure the session moves to `Error`.
    pub async fn connect_session(
        &self,
        name: &str,
        phone_number: Option<String>,
    ) -> Result<(), SessionError> {
        let name = SessionName::new(name)?;

        let previous = {
            let mut registry = self.registry.write().await;
            let entry = registry
                .get_mut(&name)
                .ok_or_else(|| SessionError::not_found(name.as_str()))?;
            entry.runtime.take()
        };
        if let Some(previous) = previous {
            previous.shutdown().await;
            self.reconnect.cleanup(&name).await;
        }

        let socket = Arc::new(SocketManager::new(
            name.clone(),
            phone_number,
            Arc::clone(&self.transport),
            Arc::clone(&self.store),
            self.options.health.clone(),
            self.options.pairing.clone(),
        ));
        let observer: Arc<dyn SessionObserver> = self.observer.clone();
        let handler = Arc::new(ConnectionHandler::new(
            Arc::clone(&socket),
            Arc::clone(&self.reconnect),
            observer,
        ));
        let runtime = SessionRuntime { socket, handler };

        {
            let mut registry = self.registry.write().await;
            let entry = registry
                .get_mut(&name)
                .ok_or_else(|| SessionError::not_found(name.as_str()))?;
            entry.runtime = Some(runtime.clone());
        }

        if let Err(e) = runtime.socket.initialize().await {
            tracing::error!(session = %name, error = %e, "Failed to connect session");
            runtime.shutdown().await;
            if let Some(entry) = self.registry.write().await.get_mut(&name) {
                entry.runtime = None;
            }
            self.observer
                .on_state_change(
                    &name,
                    StateChange::new(ConnectionStatus::Error, format!("Failed to connect: {}", e))
                        .with_reason(e.to_string()),
                )
                .await;
            return Err(SessionError::transport_init(name, e.to_string()));
        }

        runtime.handler.attach().await;
        Ok(())
    }

    /// Tears a session down and forgets it, durable artifacts included.
    ///
    /// Returns false if the name was not registered.
    pub async fn delete_session(&self, name: &str) -> bool {
        let Ok(name) = SessionName::new(name) else {
            return false;
        };

        let runtime = {
            let mut registry = self.registry.write().await;
            match registry.get_mut(&name) {
                Some(entry) => entry.runtime.take(),
                None => return false,
            }
        };
        if let Some(runtime) = runtime {
            runtime.shutdown().await;
        }

        if let Err(e) = self.store.delete_session_artifacts(&name).await {
            tracing::warn!(session = %name, error = %e, "Failed to delete session artifacts");
        }

        let removed = self.registry.write().await.remove(&name);
        if let Some(runtime) = removed.as_ref().and_then(|entry| entry.runtime.as_ref()) {
            runtime.shutdown().await;
        }
        self.reconnect.cleanup(&name).await;

        if removed.is_none() {
            return false;
        }
        tracing::info!(session = %name, "Session deleted");
        self.broadcaster.session_deleted(SessionDeleted {
            session_name: name,
            timestamp: Timestamp::now(),
        });
        true
    }

    /// Re-attaches every persisted session. Returns how many came back.
    pub async fn initialize_existing_sessions(&self) -> Result<usize, SessionError> {
        let names = self
            .store
            .list_session_names()
            .await
            .map_err(storage_error)?;
        let mut restored = 0;

        for name in names {
            let settings = match self.store.load_settings(&name).await {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(session = %name, error = %e, "Skipping session with unreadable settings");
                    continue;
                }
            };
            let owner = settings.owner.clone().unwrap_or_else(OwnerId::system);
            match self.register(name.clone(), owner, None, settings).await {
                Ok(_) => restored += 1,
                Err(e) => {
                    tracing::warn!(session = %name, error = %e, "Failed to restore session");
                }
            }
        }

        tracing::info!(restored, "Existing sessions initialized");
        Ok(restored)
    }

    /// Tears every session down, keeping durable artifacts for the next start.
    pub async fn shutdown(&self) {
        let entries: Vec<(SessionName, SessionEntry)> =
            self.registry.write().await.drain().collect();
        let count = entries.len();
        for (name, entry) in entries {
            if let Some(runtime) = entry.runtime {
                runtime.shutdown().await;
            }
            self.reconnect.cleanup(&name).await;
        }
        tracing::info!(sessions = count, "Session manager shut down");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tokens
    // ═══════════════════════════════════════════════════════════════════════

    /// Rotates a session's access token.
    pub async fn regenerate_token(&self, name: &str) -> Result<SecretString, SessionError> {
        let session_name = SessionName::new(name).map_err(|_| SessionError::not_found(name))?;
        let mut registry = self.registry.write().await;
        let entry = registry
            .get_mut(&session_name)
            .ok_or_else(|| SessionError::not_found(name))?;
        tracing::info!(session = %name, "Access token regenerated");
        Ok(entry.session.rotate_token())
    }

    /// Checks a presented access token.
    pub async fn validate_token(&self, name: &str, token: &str) -> Result<bool, SessionError> {
        let session_name = SessionName::new(name).map_err(|_| SessionError::not_found(name))?;
        let registry = self.registry.read().await;
        let entry = registry
            .get(&session_name)
            .ok_or_else(|| SessionError::not_found(name))?;
        Ok(entry.session.token_matches(token))
    }

    /// Mints a single-use bootstrap token for the real-time channel.
    pub async fn generate_ws_token(&self, owner: OwnerId) -> String {
        self.ws_tokens.issue(owner).await
    }

    /// Redeems a bootstrap token. A token works once, and only until it expires.
    pub async fn get_user_info_from_ws_token(&self, token: &str) -> Option<OwnerId> {
        self.ws_tokens.redeem(token).await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn get_session(&self, name: &str) -> Option<SessionSnapshot> {
        let name = SessionName::new(name).ok()?;
        self.registry
            .read()
            .await
            .get(&name)
            .map(|entry| entry.session.snapshot())
    }

    /// Every registered session, ordered by name.
    pub async fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<SessionSnapshot> = self
            .registry
            .read()
            .await
            .values()
            .map(|entry| entry.session.snapshot())
            .collect();
        sessions.sort_by(|a, b| a.name.cmp(&b.name));
        sessions
    }

    pub async fn session_count(&self) -> usize {
        self.registry.read().await.len()
    }

    pub async fn diagnostics(&self, name: &str) -> Result<SessionDiagnostics, SessionError> {
        let session_name =
            SessionName::new(name).map_err(|_| SessionError::not_found(name))?;
        let (session, runtime) = {
            let registry = self.registry.read().await;
            let entry = registry
                .get(&session_name)
                .ok_or_else(|| SessionError::not_found(name))?;
            (entry.session.snapshot(), entry.runtime.clone())
        };

        let (socket, health) = match runtime {
            Some(runtime) => (
                Some(runtime.socket.get_state().await),
                Some(runtime.socket.get_health_status().await),
            ),
            None => (None, None),
        };
        Ok(SessionDiagnostics {
            session,
            socket,
            health,
            reconnect_attempts: self.reconnect.attempt_count(&session_name).await,
        })
    }

    async fn check_capacity(&self, name: &SessionName) -> Result<(), SessionError> {
        let registry = self.registry.read().await;
        if registry.contains_key(name) {
            return Err(SessionError::DuplicateSession(name.clone()));
        }
        if registry.len() >= self.options.max_sessions {
            return Err(SessionError::CeilingReached {
                max: self.options.max_sessions,
            });
        }
        Ok(())
    }
}
