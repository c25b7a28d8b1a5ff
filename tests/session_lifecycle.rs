//! End-to-end session lifecycle through the SessionManager.
//!
//! Drives a simulated transport through pairing, linking, the expected
//! post-pairing restart and teardown, and checks what reaches the dashboard
//! and the webhook sink along the way.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use session_gateway::adapters::{
    ChannelBroadcaster, FileSessionStore, GatewayEvent, InMemorySessionStore,
    InMemoryWebhookDispatcher, ScriptMode, SimulatedTransport,
};
use session_gateway::application::session::{SessionManager, SessionManagerOptions};
use session_gateway::domain::connection::{codes, DisconnectCause};
use session_gateway::domain::foundation::{ConnectionStatus, ErrorCode, OwnerId, SessionName};
use session_gateway::domain::session::WebhookEventKind;
use session_gateway::ports::{ConnectionState, SessionStore, TransportEvent};

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Gateway {
    manager: SessionManager,
    transport: Arc<SimulatedTransport>,
    webhooks: Arc<InMemoryWebhookDispatcher>,
    broadcaster: Arc<ChannelBroadcaster>,
}

fn gateway_with(transport: SimulatedTransport, store: Arc<dyn SessionStore>) -> Gateway {
    let transport = Arc::new(transport);
    let webhooks = Arc::new(InMemoryWebhookDispatcher::new());
    let broadcaster = Arc::new(ChannelBroadcaster::with_default_capacity());
    let manager = SessionManager::new(
        SessionManagerOptions::default(),
        transport.clone(),
        store,
        webhooks.clone(),
        broadcaster.clone(),
        broadcaster.clone(),
    );
    Gateway {
        manager,
        transport,
        webhooks,
        broadcaster,
    }
}

fn gateway() -> Gateway {
    gateway_with(
        SimulatedTransport::new(),
        Arc::new(InMemorySessionStore::new()),
    )
}

fn owner() -> OwnerId {
    OwnerId::new("operator").unwrap()
}

fn s1() -> SessionName {
    SessionName::new("S1").unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Drains every state change received so far.
fn drain_states(rx: &mut broadcast::Receiver<GatewayEvent>) -> Vec<(ConnectionStatus, String)> {
    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let GatewayEvent::StateChanged(update) = event {
            states.push((update.status, update.detail));
        }
    }
    states
}

fn statuses(states: &[(ConnectionStatus, String)]) -> Vec<ConnectionStatus> {
    states.iter().map(|(status, _)| *status).collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn phone_pairing_link_and_expected_restart() {
    let gw = gateway();
    let mut updates = gw.broadcaster.subscribe();

    gw.manager
        .create_session("S1", owner(), Some("+15551234".into()))
        .await
        .unwrap();
    assert_eq!(
        statuses(&drain_states(&mut updates)),
        vec![ConnectionStatus::Creating, ConnectionStatus::Connecting]
    );

    // Transport asks for pairing.
    gw.transport
        .emit(&s1(), TransportEvent::PairingMaterial("qr-payload".into()))
        .await;
    settle().await;
    let snapshot = gw.manager.get_session("S1").await.unwrap();
    assert_eq!(snapshot.status, ConnectionStatus::AwaitingPairing);
    assert_eq!(snapshot.pairing_code.as_deref(), Some("ABCD-1234"));
    assert_eq!(gw.transport.pairing_requests(), 1);

    let mut pairing_codes = 0;
    while let Ok(event) = updates.try_recv() {
        if let GatewayEvent::PairingCode(update) = event {
            assert_eq!(update.phone_number, "+15551234");
            assert_eq!(update.pairing_code, "ABCD-1234");
            pairing_codes += 1;
        }
    }
    assert_eq!(pairing_codes, 1);

    // User entered the code.
    gw.transport
        .emit(
            &s1(),
            TransportEvent::ConnectionState(ConnectionState::Connecting),
        )
        .await;
    settle().await;
    let snapshot = gw.manager.get_session("S1").await.unwrap();
    assert_eq!(snapshot.status, ConnectionStatus::Connecting);
    assert!(snapshot.detail.contains("Code entered"));

    // Link completes.
    gw.transport
        .emit(&s1(), TransportEvent::ConnectionState(ConnectionState::Open))
        .await;
    settle().await;
    assert_eq!(
        gw.manager.get_session("S1").await.unwrap().status,
        ConnectionStatus::Connected
    );
    let pairing_success: Vec<_> = gw
        .webhooks
        .dispatched()
        .await
        .into_iter()
        .filter(|d| d.event.event == WebhookEventKind::PairingSuccess)
        .collect();
    assert_eq!(pairing_success.len(), 1);
    assert_eq!(
        pairing_success[0].event.details["phoneNumber"],
        serde_json::json!("+15551234")
    );
    let diagnostics = gw.manager.diagnostics("S1").await.unwrap();
    assert!(diagnostics.health.unwrap().monitoring_active);
    drain_states(&mut updates);

    // Transport drops the stream right after linking.
    gw.transport
        .emit(
            &s1(),
            TransportEvent::Closed(DisconnectCause::with_code(codes::RESTART_REQUIRED)),
        )
        .await;
    settle().await;
    let states = drain_states(&mut updates);
    assert_eq!(
        statuses(&states),
        vec![ConnectionStatus::Restarting, ConnectionStatus::Connecting]
    );
    assert!(!gw
        .webhooks
        .kinds()
        .await
        .contains(&WebhookEventKind::FatalDisconnect));
    assert_eq!(gw.transport.connect_count(&s1()).await, 2);

    // The fresh connection opens and the counter resets.
    gw.transport
        .emit(&s1(), TransportEvent::ConnectionState(ConnectionState::Open))
        .await;
    settle().await;
    let diagnostics = gw.manager.diagnostics("S1").await.unwrap();
    assert_eq!(diagnostics.session.status, ConnectionStatus::Connected);
    assert_eq!(diagnostics.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn qr_pairing_without_phone_number() {
    let gw = gateway();
    gw.manager.create_session("S1", owner(), None).await.unwrap();

    gw.transport
        .emit(&s1(), TransportEvent::PairingMaterial("qr-payload".into()))
        .await;
    settle().await;

    let snapshot = gw.manager.get_session("S1").await.unwrap();
    assert_eq!(snapshot.status, ConnectionStatus::GeneratingQr);
    assert_eq!(snapshot.qr.as_deref(), Some("qr-payload"));
    assert_eq!(gw.transport.pairing_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn fatal_disconnect_gives_up() {
    let gw = gateway();
    gw.manager.create_session("S1", owner(), None).await.unwrap();
    gw.transport
        .emit(&s1(), TransportEvent::ConnectionState(ConnectionState::Open))
        .await;
    settle().await;

    gw.transport
        .emit(
            &s1(),
            TransportEvent::Closed(DisconnectCause::with_code(codes::CREDENTIALS_REJECTED)),
        )
        .await;
    settle().await;

    assert_eq!(
        gw.manager.get_session("S1").await.unwrap().status,
        ConnectionStatus::Error
    );
    assert!(gw
        .webhooks
        .kinds()
        .await
        .contains(&WebhookEventKind::FatalDisconnect));

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(gw.transport.connect_count(&s1()).await, 1);
}

#[tokio::test(start_paused = true)]
async fn delete_is_idempotent_and_frees_capacity() {
    let gw = gateway();
    gw.manager.create_session("S1", owner(), None).await.unwrap();

    let err = gw
        .manager
        .create_session("S1", owner(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateSession);

    assert!(gw.manager.delete_session("S1").await);
    assert!(!gw.manager.delete_session("S1").await);
    assert_eq!(gw.manager.session_count().await, 0);

    gw.manager.create_session("S1", owner(), None).await.unwrap();
    assert_eq!(gw.manager.session_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn sessions_survive_a_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();

    let first = gateway_with(
        SimulatedTransport::with_mode(ScriptMode::AutoLink),
        Arc::new(FileSessionStore::new(dir.path())),
    );
    first
        .manager
        .create_session("S1", owner(), None)
        .await
        .unwrap();
    settle().await;
    assert_eq!(
        first.manager.get_session("S1").await.unwrap().status,
        ConnectionStatus::Connected
    );
    first.manager.shutdown().await;

    let second = gateway_with(
        SimulatedTransport::with_mode(ScriptMode::AutoLink),
        Arc::new(FileSessionStore::new(dir.path())),
    );
    assert_eq!(second.manager.initialize_existing_sessions().await.unwrap(), 1);
    settle().await;

    let restored = second.manager.get_session("S1").await.unwrap();
    assert_eq!(restored.owner, owner());
    assert_eq!(restored.status, ConnectionStatus::Connected);
}
