//! Reconnect backoff, ceiling and pairing de-duplication under paused time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use session_gateway::adapters::{
    ChannelBroadcaster, InMemorySessionStore, InMemoryWebhookDispatcher, SimulatedTransport,
};
use session_gateway::application::connection::{
    ReconnectStrategy, RetryError, RetryFn, ScheduleOptions, ScheduleOutcome, SocketManager,
};
use session_gateway::application::session::{SessionManager, SessionManagerOptions};
use session_gateway::domain::connection::{
    codes, DisconnectCause, HealthPolicy, PairingPolicy, ReconnectPolicy,
};
use session_gateway::domain::foundation::{ConnectionStatus, OwnerId, SessionName};
use session_gateway::domain::session::WebhookEventKind;
use session_gateway::ports::TransportEvent;

fn s1() -> SessionName {
    SessionName::new("S1").unwrap()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn failing_retry(calls: Arc<AtomicUsize>) -> RetryFn {
    Box::new(move || {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), RetryError>("connect refused".into())
        }
        .boxed()
    })
}

#[tokio::test(start_paused = true)]
async fn delays_grow_monotonically_until_refused() {
    let strategy = ReconnectStrategy::new(ReconnectPolicy::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut delays = Vec::new();
    loop {
        match strategy
            .schedule_reconnect(&s1(), failing_retry(calls.clone()), ScheduleOptions::default())
            .await
        {
            ScheduleOutcome::Scheduled { delay, .. } => {
                delays.push(delay.as_secs());
                tokio::time::sleep(delay).await;
                settle().await;
            }
            ScheduleOutcome::Refused { reason } => {
                assert!(reason.contains("10"));
                break;
            }
        }
    }

    assert_eq!(delays, vec![5, 10, 20, 40, 60, 60, 60, 60, 60, 60]);
    assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(strategy.attempt_count(&s1()).await, 10);
}

#[tokio::test(start_paused = true)]
async fn post_pairing_restart_bypasses_the_ceiling() {
    let strategy = ReconnectStrategy::new(ReconnectPolicy::default());
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        strategy
            .schedule_reconnect(&s1(), failing_retry(calls.clone()), ScheduleOptions::default())
            .await;
    }
    assert!(!strategy
        .schedule_reconnect(&s1(), failing_retry(calls.clone()), ScheduleOptions::default())
        .await
        .is_scheduled());

    let outcome = strategy
        .schedule_reconnect(
            &s1(),
            failing_retry(calls.clone()),
            ScheduleOptions {
                post_pairing_restart: true,
            },
        )
        .await;
    assert!(matches!(
        outcome,
        ScheduleOutcome::Scheduled { delay, .. } if delay == Duration::ZERO
    ));

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_connect_failures_end_in_error() {
    let transport = Arc::new(SimulatedTransport::new());
    let webhooks = Arc::new(InMemoryWebhookDispatcher::new());
    let broadcaster = Arc::new(ChannelBroadcaster::with_default_capacity());
    let manager = SessionManager::new(
        SessionManagerOptions::default(),
        transport.clone(),
        Arc::new(InMemorySessionStore::new()),
        webhooks.clone(),
        broadcaster.clone(),
        broadcaster,
    );
    manager
        .create_session("S1", OwnerId::new("operator").unwrap(), None)
        .await
        .unwrap();

    transport.fail_next_connects(usize::MAX).await;
    transport
        .emit(
            &s1(),
            TransportEvent::Closed(DisconnectCause::with_code(codes::CONNECTION_LOST)),
        )
        .await;
    tokio::time::sleep(Duration::from_secs(1_000)).await;

    let dispatched = webhooks.dispatched().await;
    let delays: Vec<u64> = dispatched
        .iter()
        .filter(|d| d.event.event == WebhookEventKind::ReconnectionAttempt)
        .filter_map(|d| d.event.details["delayMs"].as_u64())
        .collect();
    assert_eq!(
        delays,
        vec![5_000, 10_000, 20_000, 40_000, 60_000, 60_000, 60_000, 60_000, 60_000, 60_000]
    );
    assert_eq!(
        dispatched
            .iter()
            .filter(|d| d.event.event == WebhookEventKind::FatalDisconnect)
            .count(),
        1
    );
    assert_eq!(
        manager.get_session("S1").await.unwrap().status,
        ConnectionStatus::Error
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_pairing_requests_reach_the_transport_once() {
    let transport = Arc::new(SimulatedTransport::new());
    let socket = Arc::new(SocketManager::new(
        s1(),
        Some("+15551234".into()),
        transport.clone(),
        Arc::new(InMemorySessionStore::new()),
        HealthPolicy::default(),
        PairingPolicy::default(),
    ));
    socket.initialize().await.unwrap();

    let (first, second) = tokio::join!(socket.request_pairing_code(), socket.request_pairing_code());
    assert_eq!(first.unwrap(), "ABCD-1234");
    assert_eq!(second.unwrap(), "ABCD-1234");
    assert_eq!(transport.pairing_requests(), 1);

    // Outside the window a fresh code is requested.
    transport.set_pairing_code("wxyz9876").await;
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(socket.request_pairing_code().await.unwrap(), "WXYZ-9876");
    assert_eq!(transport.pairing_requests(), 2);
}
