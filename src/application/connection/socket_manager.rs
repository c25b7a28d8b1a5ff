//! SocketManager - owns the transport handle of exactly one session.
//!
//! Opens and closes the connection, forwards transport events on a single
//! per-session channel, persists rotated credentials in arrival order, probes the open
//! connection on an interval, and de-duplicates pairing-code requests.

use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::connection::{
    format_pairing_code, DisconnectCause, HealthFailure, HealthPolicy, HealthStatus,
    PairingPolicy,
};
use crate::domain::foundation::{SessionName, Timestamp};
use crate::ports::{
    ConnectionState, CredentialMaterial, SessionStore, StoreError, Transport,
    TransportConnection, TransportError, TransportEvent, TransportHandle, TransportIdentity,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Upper bound on how long `close` waits for a pending credential save.
const CREDENTIAL_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from socket operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocketError {
    #[error("No phone number configured for this session")]
    NoPhoneNumber,

    #[error("Socket not initialized")]
    NotInitialized,

    #[error("Connection closed before it opened")]
    ClosedBeforeOpen,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything the connection handler consumes, on one ordered stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Transport(TransportEvent),
    HealthCheckFailed(HealthFailure),
}

/// Diagnostic snapshot of the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketState {
    pub session_name: SessionName,
    pub initialized: bool,
    pub connection_state: ConnectionState,
    pub identity: Option<TransportIdentity>,
    pub phone_number: Option<String>,
    pub pairing_code_requested: bool,
}

#[derive(Debug, Default)]
struct PairingRequestState {
    requested: bool,
    last_code: Option<String>,
    requested_at: Option<Instant>,
}

/// Background task that persists the latest rotated credentials.
struct CredentialWriter {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// One session's connection owner.
pub struct SocketManager {
    session: SessionName,
    phone_number: Option<String>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn SessionStore>,
    health_policy: HealthPolicy,
    pairing_policy: PairingPolicy,
    handle: RwLock<Option<Arc<dyn TransportHandle>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    events_tx: mpsc::Sender<SocketEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<SocketEvent>>>,
    connection_state: watch::Sender<ConnectionState>,
    credentials: watch::Sender<Option<CredentialMaterial>>,
    credential_writer: Mutex<Option<CredentialWriter>>,
    pairing: Mutex<PairingRequestState>,
    health_task: Mutex<Option<JoinHandle<()>>>,
    health_failures: AtomicU32,
    last_health_check: Mutex<Option<Timestamp>>,
}

impl SocketManager {
    pub fn new(
        session: SessionName,
        phone_number: Option<String>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn SessionStore>,
        health_policy: HealthPolicy,
        pairing_policy: PairingPolicy,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (connection_state, _) = watch::channel(ConnectionState::Closed);
        let (credentials, _) = watch::channel(None);
        Self {
            session,
            phone_number,
            transport,
            store,
            health_policy,
            pairing_policy,
            handle: RwLock::new(None),
            pump: Mutex::new(None),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            connection_state,
            credentials,
            credential_writer: Mutex::new(None),
            pairing: Mutex::new(PairingRequestState::default()),
            health_task: Mutex::new(None),
            health_failures: AtomicU32::new(0),
            last_health_check: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &SessionName {
        &self.session
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    /// Hands out the event stream. Only the first caller gets it; the same
    /// stream survives re-initialization.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<SocketEvent>> {
        self.events_rx.lock().await.take()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Connection
    // ═══════════════════════════════════════════════════════════════════════

    /// Loads (or creates) credentials and opens a new transport connection.
    ///
    /// A previous connection, if any, is released first.
    pub async fn initialize(&self) -> Result<Arc<dyn TransportHandle>, SocketError> {
        let credentials = match self.store.load_credentials(&self.session).await? {
            Some(credentials) => credentials,
            None => {
                let fresh = CredentialMaterial::fresh();
                self.store.save_credentials(&self.session, &fresh).await?;
                tracing::debug!(session = %self.session, "Created fresh credentials");
                fresh
            }
        };

        self.release_connection().await;
        self.connection_state.send_replace(ConnectionState::Connecting);

        let TransportConnection { handle, events } =
            match self.transport.connect(&self.session, credentials).await {
                Ok(connection) => connection,
                Err(e) => {
                    self.connection_state.send_replace(ConnectionState::Closed);
                    return Err(e.into());
                }
            };

        *self.handle.write().await = Some(Arc::clone(&handle));
        self.ensure_credential_writer().await;
        let pump = tokio::spawn(pump_events(
            self.session.clone(),
            events,
            self.events_tx.clone(),
            self.credentials.clone(),
            self.connection_state.clone(),
        ));
        *self.pump.lock().await = Some(pump);

        tracing::info!(session = %self.session, "Transport connection initialized");
        Ok(handle)
    }

    /// Waits until the current connection opens or closes.
    pub async fn wait_until_open(&self) -> Result<(), SocketError> {
        let mut rx = self.connection_state.subscribe();
        let settled = rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map(|state| *state)
            .map_err(|_| SocketError::NotInitialized)?;
        match settled {
            ConnectionState::Open => Ok(()),
            _ => Err(SocketError::ClosedBeforeOpen),
        }
    }

    /// Feeds a synthetic close into the event stream after a failed connect,
    /// so the handler's disconnect path decides what happens next.
    pub async fn report_connect_failure(&self, error: &SocketError) {
        let cause = DisconnectCause::with_message(error.to_string());
        if self
            .events_tx
            .send(SocketEvent::Transport(TransportEvent::Closed(cause)))
            .await
            .is_err()
        {
            tracing::debug!(session = %self.session, "Event stream gone, connect failure dropped");
        }
    }

    /// Stops monitoring, forgets pairing state and releases the connection.
    ///
    /// Returns only after any credential save already in flight has landed,
    /// so callers may delete the session's artifacts right after. Never
    /// fails; release errors are logged.
    pub async fn close(&self) {
        self.stop_health_monitoring().await;
        *self.pairing.lock().await = PairingRequestState::default();
        self.release_connection().await;
        self.flush_credential_writer().await;
    }

    async fn ensure_credential_writer(&self) {
        let mut writer = self.credential_writer.lock().await;
        if writer.as_ref().is_some_and(|w| !w.task.is_finished()) {
            return;
        }
        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(write_credentials(
            self.session.clone(),
            Arc::clone(&self.store),
            self.credentials.subscribe(),
            stop_rx,
        ));
        *writer = Some(CredentialWriter { stop, task });
    }

    async fn flush_credential_writer(&self) {
        let Some(CredentialWriter { stop, mut task }) = self.credential_writer.lock().await.take()
        else {
            return;
        };
        // The writer may already have exited.
        stop.send(()).ok();
        if tokio::time::timeout(CREDENTIAL_FLUSH_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            task.abort();
            tracing::warn!(session = %self.session, "Credential save did not finish before close");
        }
    }

    async fn release_connection(&self) {
        if let Some(pump) = self.pump.lock().await.take() {
            pump.abort();
        }
        let previous = self.handle.write().await.take();
        if let Some(handle) = previous {
            if let Err(e) = handle.close().await {
                tracing::warn!(session = %self.session, error = %e, "Error closing transport handle");
            }
        }
        self.connection_state.send_replace(ConnectionState::Closed);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Pairing
    // ═══════════════════════════════════════════════════════════════════════

    /// Requests a pairing code for the configured phone number.
    ///
    /// A request inside the dedup window returns the cached code without
    /// contacting the transport.
    pub async fn request_pairing_code(&self) -> Result<String, SocketError> {
        let phone_number = self
            .phone_number
            .as_deref()
            .ok_or(SocketError::NoPhoneNumber)?;
        let handle = self
            .handle
            .read()
            .await
            .clone()
            .ok_or(SocketError::NotInitialized)?;

        let mut pairing = self.pairing.lock().await;
        if pairing.requested {
            if let (Some(code), Some(at)) = (&pairing.last_code, pairing.requested_at) {
                if at.elapsed() < self.pairing_policy.dedup_window {
                    tracing::debug!(session = %self.session, "Reusing recent pairing code");
                    return Ok(code.clone());
                }
            }
        }

        pairing.requested = true;
        pairing.requested_at = Some(Instant::now());
        match handle.request_pairing_code(phone_number).await {
            Ok(raw) => {
                let code = format_pairing_code(&raw);
                pairing.last_code = Some(code.clone());
                tracing::info!(session = %self.session, "Pairing code issued");
                Ok(code)
            }
            Err(e) => {
                *pairing = PairingRequestState::default();
                tracing::warn!(session = %self.session, error = %e, "Pairing code request failed");
                Err(e.into())
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Health monitoring
    // ═══════════════════════════════════════════════════════════════════════

    /// Starts the periodic health check. No-op if already running.
    pub async fn start_health_monitoring(self: &Arc<Self>) {
        let mut task = self.health_task.lock().await;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        self.health_failures.store(0, Ordering::SeqCst);

        let manager: Weak<Self> = Arc::downgrade(self);
        let interval = self.health_policy.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.run_health_check().await;
            }
        }));
        tracing::debug!(session = %self.session, "Health monitoring started");
    }

    /// Stops the periodic health check. No-op if not running.
    pub async fn stop_health_monitoring(&self) {
        if let Some(task) = self.health_task.lock().await.take() {
            task.abort();
            tracing::debug!(session = %self.session, "Health monitoring stopped");
        }
        self.health_failures.store(0, Ordering::SeqCst);
    }

    async fn run_health_check(&self) {
        *self.last_health_check.lock().await = Some(Timestamp::now());
        let handle = self.handle.read().await.clone();

        let outcome = match handle {
            None => Err("No transport handle".to_string()),
            Some(handle) if handle.connection_state() != ConnectionState::Open => Err(format!(
                "Connection is {:?}",
                handle.connection_state()
            )),
            Some(handle) => {
                match tokio::time::timeout(
                    self.health_policy.probe_timeout,
                    handle.send_presence_probe(),
                )
                .await
                {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "Presence probe timed out after {}ms",
                        self.health_policy.probe_timeout.as_millis()
                    )),
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.health_failures.store(0, Ordering::SeqCst);
            }
            Err(reason) => {
                let failures = self.health_failures.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(
                    session = %self.session,
                    failures,
                    reason = %reason,
                    "Health check failed"
                );
                if failures >= self.health_policy.failure_threshold {
                    self.health_failures.store(0, Ordering::SeqCst);
                    let signal = SocketEvent::HealthCheckFailed(HealthFailure {
                        consecutive_failures: failures,
                        reason,
                    });
                    if self.events_tx.send(signal).await.is_err() {
                        tracing::debug!(session = %self.session, "Event stream gone, health signal dropped");
                    }
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub async fn is_connected(&self) -> bool {
        self.handle
            .read()
            .await
            .as_ref()
            .is_some_and(|h| h.connection_state() == ConnectionState::Open)
    }

    pub async fn get_state(&self) -> SocketState {
        let handle = self.handle.read().await.clone();
        let pairing_code_requested = self.pairing.lock().await.requested;
        SocketState {
            session_name: self.session.clone(),
            initialized: handle.is_some(),
            connection_state: handle
                .as_ref()
                .map(|h| h.connection_state())
                .unwrap_or(ConnectionState::Closed),
            identity: handle.as_ref().and_then(|h| h.identity()),
            phone_number: self.phone_number.clone(),
            pairing_code_requested,
        }
    }

    pub async fn get_health_status(&self) -> HealthStatus {
        let monitoring_active = self
            .health_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_finished());
        HealthStatus {
            monitoring_active,
            consecutive_failures: self.health_failures.load(Ordering::SeqCst),
            failure_threshold: self.health_policy.failure_threshold,
            last_check_at: *self.last_health_check.lock().await,
        }
    }

    /// Identity reported by the current connection.
    pub async fn identity(&self) -> Option<TransportIdentity> {
        self.handle.read().await.as_ref().and_then(|h| h.identity())
    }
}

async fn pump_events(
    session: SessionName,
    mut events: mpsc::Receiver<TransportEvent>,
    out: mpsc::Sender<SocketEvent>,
    credentials: watch::Sender<Option<CredentialMaterial>>,
    connection_state: watch::Sender<ConnectionState>,
) {
    while let Some(event) = events.recv().await {
        match &event {
            TransportEvent::ConnectionState(state) => {
                connection_state.send_replace(*state);
            }
            TransportEvent::Closed(_) => {
                connection_state.send_replace(ConnectionState::Closed);
            }
            TransportEvent::CredentialsUpdated(material) => {
                credentials.send_replace(Some(material.clone()));
                continue;
            }
            TransportEvent::PairingMaterial(_) | TransportEvent::Message(_) => {}
        }
        if out.send(SocketEvent::Transport(event)).await.is_err() {
            break;
        }
    }
    tracing::debug!(session = %session, "Transport event stream ended");
}

/// Saves credential updates one at a time. Updates that arrive during a save
/// collapse into the newest, so the store never ends on an older value.
async fn write_credentials(
    session: SessionName,
    store: Arc<dyn SessionStore>,
    mut updates: watch::Receiver<Option<CredentialMaterial>>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = updates.borrow_and_update().clone();
                if let Some(credentials) = latest {
                    if let Err(e) = store.save_credentials(&session, &credentials).await {
                        tracing::warn!(session = %session, error = %e, "Failed to persist credentials");
                    }
                }
            }
            _ = &mut stop => break,
        }
    }
    tracing::debug!(session = %session, "Credential writer stopped");
}
