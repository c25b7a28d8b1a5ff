//! Simulated Transport for tests and local runs.
//!
//! An in-process stand-in for the messaging protocol client. Tests script it
//! by emitting events into a session's current connection; the binary uses
//! the auto-link mode, which pairs and opens every connection on its own.
//!
//! # Features
//!
//! - Event injection per session
//! - Connect failure injection
//! - Configurable pairing codes and pairing failures
//! - Probe behaviour (ack, fail, hang) for health-check testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let transport = SimulatedTransport::new();
//! let connection = transport.connect(&name, CredentialMaterial::fresh()).await?;
//! transport.emit(&name, TransportEvent::ConnectionState(ConnectionState::Open)).await;
//! ```

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::domain::foundation::SessionName;
use crate::ports::{
    ConnectionState, CredentialMaterial, Transport, TransportConnection, TransportError,
    TransportEvent, TransportHandle, TransportIdentity,
};

const EVENT_BUFFER: usize = 32;
const DEFAULT_PAIRING_CODE: &str = "ABCD1234";

/// How presence probes answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeBehavior {
    #[default]
    Ack,
    Fail,
    /// Never answers; exercises probe timeouts.
    Hang,
}

/// What the transport does on its own after `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptMode {
    /// Nothing; every event is emitted by the caller.
    #[default]
    Manual,
    /// Fresh credentials: pairing material, new credentials, open.
    /// Stored credentials: connecting, open.
    AutoLink,
}

#[derive(Debug)]
struct SharedBehavior {
    pairing_code: Mutex<String>,
    pairing_fails: AtomicBool,
    pairing_requests: AtomicUsize,
    probe: Mutex<ProbeBehavior>,
}

struct SimulatedLink {
    events: mpsc::Sender<TransportEvent>,
    handle: Arc<SimulatedHandle>,
}

/// Scriptable in-process transport.
pub struct SimulatedTransport {
    mode: ScriptMode,
    shared: Arc<SharedBehavior>,
    links: Mutex<HashMap<SessionName, SimulatedLink>>,
    connects: Mutex<HashMap<SessionName, usize>>,
    failing_connects: AtomicUsize,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedTransport {
    /// Creates a manually scripted transport.
    pub fn new() -> Self {
        Self::with_mode(ScriptMode::Manual)
    }

    pub fn with_mode(mode: ScriptMode) -> Self {
        Self {
            mode,
            shared: Arc::new(SharedBehavior {
                pairing_code: Mutex::new(DEFAULT_PAIRING_CODE.to_string()),
                pairing_fails: AtomicBool::new(false),
                pairing_requests: AtomicUsize::new(0),
                probe: Mutex::new(ProbeBehavior::Ack),
            }),
            links: Mutex::new(HashMap::new()),
            connects: Mutex::new(HashMap::new()),
            failing_connects: AtomicUsize::new(0),
        }
    }

    /// Sends `event` on the session's latest connection.
    ///
    /// Connection-state and close events also update the handle. Returns
    /// false if the session has no connection or nobody is listening.
    pub async fn emit(&self, session: &SessionName, event: TransportEvent) -> bool {
        let link = {
            let links = self.links.lock().await;
            links
                .get(session)
                .map(|link| (link.events.clone(), Arc::clone(&link.handle)))
        };
        let Some((events, handle)) = link else {
            return false;
        };
        match &event {
            TransportEvent::ConnectionState(state) => handle.set_state(*state),
            TransportEvent::Closed(_) => handle.set_state(ConnectionState::Closed),
            _ => {}
        }
        events.send(event).await.is_ok()
    }

    /// Makes the next `count` connect calls fail.
    pub async fn fail_next_connects(&self, count: usize) {
        self.failing_connects.store(count, Ordering::SeqCst);
    }

    pub async fn set_pairing_code(&self, raw: impl Into<String>) {
        *self.shared.pairing_code.lock().await = raw.into();
    }

    pub async fn fail_pairing(&self, fail: bool) {
        self.shared.pairing_fails.store(fail, Ordering::SeqCst);
    }

    pub async fn set_probe_behavior(&self, behavior: ProbeBehavior) {
        *self.shared.probe.lock().await = behavior;
    }

    /// Pairing-code requests received, across all sessions.
    pub fn pairing_requests(&self) -> usize {
        self.shared.pairing_requests.load(Ordering::SeqCst)
    }

    /// Successful connects for the session.
    pub async fn connect_count(&self, session: &SessionName) -> usize {
        self.connects.lock().await.get(session).copied().unwrap_or(0)
    }

    /// State of the session's latest handle.
    pub async fn handle_state(&self, session: &SessionName) -> Option<ConnectionState> {
        self.links
            .lock()
            .await
            .get(session)
            .map(|link| link.handle.connection_state())
    }

    fn take_connect_failure(&self) -> bool {
        self.failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn auto_link_script(
        session: &SessionName,
        credentials: &CredentialMaterial,
    ) -> Vec<TransportEvent> {
        let mut script = vec![TransportEvent::ConnectionState(ConnectionState::Connecting)];
        if credentials.is_fresh() {
            script.push(TransportEvent::PairingMaterial(format!(
                "simulated-qr:{}",
                session
            )));
            script.push(TransportEvent::CredentialsUpdated(CredentialMaterial(
                json!({ "me": { "id": format!("{}@simulated", session) } }),
            )));
        }
        script.push(TransportEvent::ConnectionState(ConnectionState::Open));
        script
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn connect(
        &self,
        session: &SessionName,
        credentials: CredentialMaterial,
    ) -> Result<TransportConnection, TransportError> {
        if self.take_connect_failure() {
            return Err(TransportError::ConnectFailed(
                "simulated connect failure".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let handle = Arc::new(SimulatedHandle::new(
            session.clone(),
            Arc::clone(&self.shared),
        ));

        if self.mode == ScriptMode::AutoLink {
            for event in Self::auto_link_script(session, &credentials) {
                if let TransportEvent::ConnectionState(state) = &event {
                    handle.set_state(*state);
                }
                if tx.try_send(event).is_err() {
                    break;
                }
            }
        }

        self.links.lock().await.insert(
            session.clone(),
            SimulatedLink {
                events: tx,
                handle: Arc::clone(&handle),
            },
        );
        *self.connects.lock().await.entry(session.clone()).or_insert(0) += 1;
        tracing::debug!(session = %session, "Simulated connection opened");

        Ok(TransportConnection { handle, events: rx })
    }
}

/// Handle of one simulated connection.
pub struct SimulatedHandle {
    session: SessionName,
    state: AtomicU8,
    shared: Arc<SharedBehavior>,
}

impl SimulatedHandle {
    fn new(session: SessionName, shared: Arc<SharedBehavior>) -> Self {
        Self {
            session,
            state: AtomicU8::new(encode_state(ConnectionState::Connecting)),
            shared,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(encode_state(state), Ordering::SeqCst);
    }
}

fn encode_state(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Connecting => 0,
        ConnectionState::Open => 1,
        ConnectionState::Closed => 2,
    }
}

fn decode_state(raw: u8) -> ConnectionState {
    match raw {
        0 => ConnectionState::Connecting,
        1 => ConnectionState::Open,
        _ => ConnectionState::Closed,
    }
}

#[async_trait]
impl TransportHandle for SimulatedHandle {
    fn connection_state(&self) -> ConnectionState {
        decode_state(self.state.load(Ordering::SeqCst))
    }

    fn identity(&self) -> Option<TransportIdentity> {
        (self.connection_state() == ConnectionState::Open).then(|| TransportIdentity {
            id: format!("{}@simulated", self.session),
            display_name: Some(format!("Simulated {}", self.session)),
        })
    }

    async fn request_pairing_code(&self, _phone_number: &str) -> Result<String, TransportError> {
        self.shared.pairing_requests.fetch_add(1, Ordering::SeqCst);
        if self.shared.pairing_fails.load(Ordering::SeqCst) {
            return Err(TransportError::PairingFailed(
                "simulated pairing failure".to_string(),
            ));
        }
        Ok(self.shared.pairing_code.lock().await.clone())
    }

    async fn send_presence_probe(&self) -> Result<(), TransportError> {
        let behavior = *self.shared.probe.lock().await;
        match behavior {
            ProbeBehavior::Ack => Ok(()),
            ProbeBehavior::Fail => Err(TransportError::ProbeFailed(
                "simulated probe failure".to_string(),
            )),
            ProbeBehavior::Hang => futures::future::pending().await,
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.set_state(ConnectionState::Closed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s1() -> SessionName {
        SessionName::new("S1").unwrap()
    }

    #[tokio::test]
    async fn emit_without_connection_returns_false() {
        let transport = SimulatedTransport::new();
        assert!(
            !transport
                .emit(&s1(), TransportEvent::ConnectionState(ConnectionState::Open))
                .await
        );
    }

    #[tokio::test]
    async fn emitted_state_updates_handle() {
        let transport = SimulatedTransport::new();
        let mut connection = transport
            .connect(&s1(), CredentialMaterial::fresh())
            .await
            .unwrap();
        assert_eq!(
            connection.handle.connection_state(),
            ConnectionState::Connecting
        );
        assert!(connection.handle.identity().is_none());

        transport
            .emit(&s1(), TransportEvent::ConnectionState(ConnectionState::Open))
            .await;

        assert_eq!(connection.handle.connection_state(), ConnectionState::Open);
        assert_eq!(
            connection.handle.identity().unwrap().id,
            "S1@simulated".to_string()
        );
        assert!(connection.events.recv().await.is_some());
    }

    #[tokio::test]
    async fn connect_failures_are_consumed_one_at_a_time() {
        let transport = SimulatedTransport::new();
        transport.fail_next_connects(1).await;

        assert!(transport.connect(&s1(), CredentialMaterial::fresh()).await.is_err());
        assert!(transport.connect(&s1(), CredentialMaterial::fresh()).await.is_ok());
        assert_eq!(transport.connect_count(&s1()).await, 1);
    }

    #[tokio::test]
    async fn auto_link_pairs_fresh_sessions() {
        let transport = SimulatedTransport::with_mode(ScriptMode::AutoLink);
        let mut connection = transport
            .connect(&s1(), CredentialMaterial::fresh())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = connection.events.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[1], TransportEvent::PairingMaterial(_)));
        assert!(matches!(events[2], TransportEvent::CredentialsUpdated(_)));
        assert_eq!(
            events.last(),
            Some(&TransportEvent::ConnectionState(ConnectionState::Open))
        );
    }
}
