//! ConnectionHandler - the per-session state machine.
//!
//! Consumes the socket's event stream in order and turns each event into a
//! status transition, a reconnect decision or an outbound notification.
//! Every transition is validated against [`ConnectionStatus`]'s state
//! machine; invalid ones are logged and dropped.

use futures::FutureExt;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::connection::{DisconnectCause, HealthFailure, PairingWindow};
use crate::domain::foundation::{ConnectionStatus, SessionName, StateMachine, Timestamp};
use crate::domain::session::{
    InboundMessage, PairingUpdate, StateChange, WebhookEvent, WebhookEventKind,
};
use crate::ports::{ConnectionState, TransportEvent};

use super::{
    ReconnectStrategy, RetryError, RetryFn, ScheduleOptions, ScheduleOutcome, SessionObserver,
    SocketError, SocketEvent, SocketManager,
};

#[derive(Debug, Default)]
struct HandlerState {
    status: ConnectionStatus,
    /// Opened when the user enters a pairing code; consumed by the first
    /// expected restart.
    pairing_window: Option<PairingWindow>,
    /// Set with the pairing window, cleared once pairing success is announced.
    announce_pairing_success: bool,
}

/// State machine for one session.
pub struct ConnectionHandler {
    session: SessionName,
    phone_number: Option<String>,
    socket: Arc<SocketManager>,
    reconnect: Arc<ReconnectStrategy>,
    observer: Arc<dyn SessionObserver>,
    state: Mutex<HandlerState>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionHandler {
    pub fn new(
        socket: Arc<SocketManager>,
        reconnect: Arc<ReconnectStrategy>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            session: socket.session().clone(),
            phone_number: socket.phone_number().map(String::from),
            socket,
            reconnect,
            observer,
            state: Mutex::new(HandlerState::default()),
            event_loop: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &SessionName {
        &self.session
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.state.lock().await.status
    }

    /// Moves to `Connecting` and starts consuming the socket's events.
    ///
    /// Calling it again is a no-op.
    pub async fn attach(self: &Arc<Self>) {
        let Some(mut events) = self.socket.take_events().await else {
            tracing::debug!(session = %self.session, "Handler already attached");
            return;
        };
        self.transition(StateChange::new(
            ConnectionStatus::Connecting,
            "Connecting to transport",
        ))
        .await;

        let handler: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(handler) = handler.upgrade() else {
                    break;
                };
                handler.handle_event(event).await;
            }
        });
        *self.event_loop.lock().await = Some(task);
    }

    /// Stops the event loop, health monitoring and reconnect bookkeeping.
    pub async fn cleanup(&self) {
        if let Some(task) = self.event_loop.lock().await.take() {
            task.abort();
        }
        self.socket.stop_health_monitoring().await;
        self.reconnect.cleanup(&self.session).await;
        tracing::debug!(session = %self.session, "Connection handler cleaned up");
    }

    async fn handle_event(self: &Arc<Self>, event: SocketEvent) {
        let terminal = self.status().await.is_terminal();
        match event {
            SocketEvent::Transport(TransportEvent::Message(payload)) => {
                self.forward_message(payload).await
            }
            SocketEvent::HealthCheckFailed(failure) => self.on_health_failure(failure).await,
            event if terminal => {
                tracing::debug!(session = %self.session, ?event, "Ignoring event in terminal state");
            }
            SocketEvent::Transport(TransportEvent::PairingMaterial(material)) => {
                self.on_pairing_material(material).await
            }
            SocketEvent::Transport(TransportEvent::ConnectionState(state)) => match state {
                ConnectionState::Connecting => self.on_connecting().await,
                ConnectionState::Open => self.on_open().await,
                // The cause arrives with the separate `Closed` event.
                ConnectionState::Closed => {}
            },
            SocketEvent::Transport(TransportEvent::Closed(cause)) => self.on_closed(cause).await,
            SocketEvent::Transport(TransportEvent::CredentialsUpdated(_)) => {}
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transport events
    // ═══════════════════════════════════════════════════════════════════════

    async fn on_pairing_material(&self, material: String) {
        let Some(phone_number) = self.phone_number.clone() else {
            self.transition(
                StateChange::new(ConnectionStatus::GeneratingQr, "Scan the QR code to link")
                    .with_qr(material),
            )
            .await;
            return;
        };

        self.transition(StateChange::new(
            ConnectionStatus::AwaitingPairing,
            "Requesting pairing code",
        ))
        .await;

        match self.socket.request_pairing_code().await {
            Ok(code) => {
                self.transition(
                    StateChange::new(
                        ConnectionStatus::AwaitingPairing,
                        format!("Enter code {} on your phone", code),
                    )
                    .with_pairing_code(code.clone()),
                )
                .await;
                self.observer
                    .on_pairing_update(PairingUpdate {
                        session_name: self.session.clone(),
                        phone_number,
                        pairing_code: code,
                        timestamp: Timestamp::now(),
                    })
                    .await;
            }
            Err(e) => {
                tracing::error!(session = %self.session, error = %e, "Could not obtain pairing code");
                self.transition(
                    StateChange::new(
                        ConnectionStatus::PairingFailed,
                        format!("Failed to get pairing code: {}", e),
                    )
                    .with_reason(e.to_string()),
                )
                .await;
                self.socket.close().await;
            }
        }
    }

    async fn on_connecting(&self) {
        let code_entered = {
            let mut state = self.state.lock().await;
            let entered =
                self.phone_number.is_some() && state.status == ConnectionStatus::AwaitingPairing;
            if entered {
                state.pairing_window = Some(PairingWindow::new(
                    Instant::now(),
                    self.reconnect.policy().post_pairing_window,
                ));
                state.announce_pairing_success = true;
            }
            entered
        };

        if code_entered {
            tracing::info!(session = %self.session, "Pairing code entered");
            self.transition(StateChange::new(
                ConnectionStatus::Connecting,
                "Code entered, linking device",
            ))
            .await;
        } else if self
            .transition(StateChange::new(ConnectionStatus::Connecting, "Connecting"))
            .await
        {
            self.emit_webhook(WebhookEvent::new(
                WebhookEventKind::Connecting,
                self.session.clone(),
            ))
            .await;
        }
    }

    async fn on_open(self: &Arc<Self>) {
        let identity = self.socket.identity().await;
        let identity_id = identity.as_ref().map(|i| i.id.clone());
        let display_name = identity
            .as_ref()
            .and_then(|i| i.display_name.clone())
            .or_else(|| identity_id.clone())
            .unwrap_or_else(|| "unknown".to_string());

        let announce = std::mem::take(&mut self.state.lock().await.announce_pairing_success);

        let detail = match &self.phone_number {
            Some(phone) => format!("Connected as {} ({})", display_name, phone),
            None => format!("Connected as {}", display_name),
        };

        if announce {
            if let Some(phone) = &self.phone_number {
                tracing::info!(session = %self.session, "Device paired");
                self.emit_webhook(
                    WebhookEvent::new(WebhookEventKind::PairingSuccess, self.session.clone())
                        .with_detail("phoneNumber", phone.clone())
                        .with_detail("displayName", display_name.clone())
                        .with_detail("identity", identity_id.clone()),
                )
                .await;
            }
        }

        if !self
            .transition(StateChange::new(ConnectionStatus::Connected, detail))
            .await
        {
            return;
        }
        tracing::info!(session = %self.session, "Session connected");

        let mut connected = WebhookEvent::new(WebhookEventKind::Connected, self.session.clone())
            .with_detail("displayName", display_name)
            .with_detail("identity", identity_id);
        if let Some(phone) = &self.phone_number {
            connected = connected.with_detail("phoneNumber", phone.clone());
        }
        self.emit_webhook(connected).await;

        self.socket.start_health_monitoring().await;
        self.reconnect.reset_retries(&self.session).await;
    }

    async fn on_closed(self: &Arc<Self>, cause: DisconnectCause) {
        self.socket.stop_health_monitoring().await;

        let window = self.state.lock().await.pairing_window;
        let decision = self
            .reconnect
            .should_reconnect(&self.session, &cause, window)
            .await;

        if decision.post_pairing_restart {
            self.state.lock().await.pairing_window = None;
            tracing::info!(session = %self.session, "Expected restart after device link");
            self.transition(
                StateChange::new(
                    ConnectionStatus::Restarting,
                    "Device linked, restarting connection",
                )
                .with_reason(decision.reason),
            )
            .await;
            self.schedule(ScheduleOptions {
                post_pairing_restart: true,
            })
            .await;
            return;
        }

        tracing::info!(
            session = %self.session,
            code = ?cause.code,
            reason = %decision.reason,
            "Session disconnected"
        );
        self.transition(
            StateChange::new(ConnectionStatus::Disconnected, cause.reason_text())
                .with_reason(cause.to_string()),
        )
        .await;
        self.emit_webhook(
            WebhookEvent::new(WebhookEventKind::Disconnected, self.session.clone())
                .with_detail("code", cause.code)
                .with_detail("reason", cause.reason_text()),
        )
        .await;

        if !decision.retry {
            self.give_up(cause.code, decision.reason, decision.fatal).await;
            return;
        }

        match self.schedule(ScheduleOptions::default()).await {
            ScheduleOutcome::Scheduled { delay, attempt } => {
                self.emit_webhook(
                    WebhookEvent::new(WebhookEventKind::ReconnectionAttempt, self.session.clone())
                        .with_detail("attempt", attempt)
                        .with_detail("delayMs", delay.as_millis() as u64)
                        .with_detail("code", cause.code),
                )
                .await;
            }
            ScheduleOutcome::Refused { reason } => {
                self.give_up(cause.code, reason, false).await;
            }
        }
    }

    async fn give_up(&self, code: Option<u16>, reason: String, fatal: bool) {
        let status = if self.phone_number.is_some() {
            ConnectionStatus::PairingFailed
        } else {
            ConnectionStatus::Error
        };
        tracing::error!(
            session = %self.session,
            code = ?code,
            reason = %reason,
            fatal,
            "Giving up on session"
        );
        self.transition(StateChange::new(status, reason.clone()).with_reason(reason.clone()))
            .await;
        self.emit_webhook(
            WebhookEvent::new(WebhookEventKind::FatalDisconnect, self.session.clone())
                .with_detail("code", code)
                .with_detail("reason", reason)
                .with_detail("fatal", fatal),
        )
        .await;
        self.reconnect.cancel_scheduled_reconnect(&self.session).await;
        self.socket.close().await;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Side streams
    // ═══════════════════════════════════════════════════════════════════════

    async fn forward_message(&self, payload: Value) {
        self.observer
            .on_message(InboundMessage {
                session_name: self.session.clone(),
                payload,
                received_at: Timestamp::now(),
            })
            .await;
    }

    async fn on_health_failure(&self, failure: HealthFailure) {
        tracing::warn!(
            session = %self.session,
            failures = failure.consecutive_failures,
            reason = %failure.reason,
            "Health check threshold reached"
        );
        self.emit_webhook(
            WebhookEvent::new(WebhookEventKind::HealthCheckFailed, self.session.clone())
                .with_detail("consecutiveFailures", failure.consecutive_failures)
                .with_detail("reason", failure.reason),
        )
        .await;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reconnect
    // ═══════════════════════════════════════════════════════════════════════

    async fn schedule(self: &Arc<Self>, options: ScheduleOptions) -> ScheduleOutcome {
        let handler: Weak<Self> = Arc::downgrade(self);
        let retry: RetryFn = Box::new(move || {
            async move {
                match handler.upgrade() {
                    Some(handler) => handler
                        .retry_connection()
                        .await
                        .map_err(|e| Box::new(e) as RetryError),
                    None => Ok(()),
                }
            }
            .boxed()
        });
        self.reconnect
            .schedule_reconnect(&self.session, retry, options)
            .await
    }

    /// Reopens the connection. Succeeds once the new connection is open.
    async fn retry_connection(&self) -> Result<(), SocketError> {
        if !self.observer.is_registered(&self.session).await {
            tracing::debug!(session = %self.session, "Session gone, skipping reconnect");
            return Ok(());
        }

        let attempt = self.reconnect.attempt_count(&self.session).await;
        self.transition(StateChange::new(
            ConnectionStatus::Connecting,
            format!("Reconnecting (attempt {})", attempt),
        ))
        .await;

        if let Err(e) = self.socket.initialize().await {
            tracing::warn!(session = %self.session, error = %e, "Reconnect could not open transport");
            self.socket.report_connect_failure(&e).await;
            return Err(e);
        }
        self.socket.wait_until_open().await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════

    /// Applies a transition if the state machine allows it.
    ///
    /// The state lock is held while the observer runs so transitions reach
    /// the registry in the order they were decided.
    async fn transition(&self, change: StateChange) -> bool {
        let mut state = self.state.lock().await;
        if !state.status.can_transition_to(&change.status) {
            tracing::warn!(
                session = %self.session,
                from = %state.status,
                to = %change.status,
                "Dropping invalid state transition"
            );
            return false;
        }
        tracing::debug!(
            session = %self.session,
            from = %state.status,
            to = %change.status,
            detail = %change.detail,
            "State transition"
        );
        state.status = change.status;
        self.observer.on_state_change(&self.session, change).await;
        true
    }

    async fn emit_webhook(&self, event: WebhookEvent) {
        self.observer.on_webhook_event(event).await;
    }
}
