//! ReconnectStrategy - decides whether to reconnect and arms backoff timers.
//!
//! Keyed by session name only; it never sees business state. Each session has
//! an attempt counter and at most one pending timer.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::connection::{
    classify, DisconnectCause, DisconnectKind, PairingWindow, ReconnectPolicy,
};
use crate::domain::foundation::SessionName;

/// Error type a retry may fail with.
pub type RetryError = Box<dyn std::error::Error + Send + Sync>;

/// Deferred reconnect action run when the timer fires.
pub type RetryFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), RetryError>> + Send>;

/// Answer of [`ReconnectStrategy::should_reconnect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectDecision {
    pub retry: bool,
    pub reason: String,
    pub code: Option<u16>,
    pub fatal: bool,
    pub post_pairing_restart: bool,
}

/// Options for [`ReconnectStrategy::schedule_reconnect`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOptions {
    pub post_pairing_restart: bool,
}

/// Result of a scheduling request. Refusal is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Scheduled { delay: Duration, attempt: u32 },
    Refused { reason: String },
}

impl ScheduleOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, ScheduleOutcome::Scheduled { .. })
    }
}

struct PendingReconnect {
    timer_id: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct ReconnectState {
    attempt_count: u32,
    pending: Option<PendingReconnect>,
}

/// Per-session reconnect bookkeeping shared by every connection handler.
pub struct ReconnectStrategy {
    policy: ReconnectPolicy,
    states: Arc<Mutex<HashMap<SessionName, ReconnectState>>>,
    next_timer_id: AtomicU64,
}

impl ReconnectStrategy {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            states: Arc::new(Mutex::new(HashMap::new())),
            next_timer_id: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Classifies a disconnect for `session`.
    ///
    /// `pairing` is the window opened when the user entered a pairing code,
    /// if one is open.
    pub async fn should_reconnect(
        &self,
        session: &SessionName,
        cause: &DisconnectCause,
        pairing: Option<PairingWindow>,
    ) -> ReconnectDecision {
        let kind = classify(cause, pairing, Instant::now());
        let attempts = self.attempt_count(session).await;

        match kind {
            DisconnectKind::Fatal => ReconnectDecision {
                retry: false,
                reason: cause.reason_text(),
                code: cause.code,
                fatal: true,
                post_pairing_restart: false,
            },
            DisconnectKind::ExpectedRestart => ReconnectDecision {
                retry: true,
                reason: "Restart after device link".to_string(),
                code: cause.code,
                fatal: false,
                post_pairing_restart: true,
            },
            DisconnectKind::Transient if self.policy.is_exhausted(attempts) => ReconnectDecision {
                retry: false,
                reason: self.ceiling_reason(),
                code: cause.code,
                fatal: false,
                post_pairing_restart: false,
            },
            DisconnectKind::Transient => ReconnectDecision {
                retry: true,
                reason: cause.reason_text(),
                code: cause.code,
                fatal: false,
                post_pairing_restart: false,
            },
        }
    }

    /// Arms a timer that runs `retry` after the backoff delay.
    ///
    /// The attempt counter is incremented here, so repeated schedules keep
    /// growing the delay even when retries fail. Any timer already pending
    /// for the session is cancelled first.
    pub async fn schedule_reconnect(
        &self,
        session: &SessionName,
        retry: RetryFn,
        options: ScheduleOptions,
    ) -> ScheduleOutcome {
        let mut states = self.states.lock().await;
        let state = states.entry(session.clone()).or_default();

        if !options.post_pairing_restart && self.policy.is_exhausted(state.attempt_count) {
            tracing::warn!(
                session = %session,
                attempts = state.attempt_count,
                "Reconnect refused, attempt ceiling reached"
            );
            return ScheduleOutcome::Refused {
                reason: self.ceiling_reason(),
            };
        }

        let delay = if options.post_pairing_restart {
            self.policy.post_pairing_delay
        } else {
            self.policy.delay_for(state.attempt_count)
        };
        state.attempt_count += 1;
        let attempt = state.attempt_count;

        if let Some(previous) = state.pending.take() {
            previous.task.abort();
        }

        let timer_id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(run_retry(
            Arc::clone(&self.states),
            session.clone(),
            timer_id,
            delay,
            retry,
        ));
        state.pending = Some(PendingReconnect { timer_id, task });

        tracing::info!(
            session = %session,
            attempt,
            delay_ms = delay.as_millis() as u64,
            post_pairing = options.post_pairing_restart,
            "Reconnect scheduled"
        );
        ScheduleOutcome::Scheduled { delay, attempt }
    }

    /// Resets the attempt counter after a successful connect.
    pub async fn reset_retries(&self, session: &SessionName) {
        if let Some(state) = self.states.lock().await.get_mut(session) {
            state.attempt_count = 0;
        }
    }

    /// Cancels the pending timer, including a retry already in flight.
    pub async fn cancel_scheduled_reconnect(&self, session: &SessionName) {
        if let Some(state) = self.states.lock().await.get_mut(session) {
            if let Some(pending) = state.pending.take() {
                pending.task.abort();
                tracing::debug!(session = %session, "Pending reconnect cancelled");
            }
        }
    }

    /// Drops all bookkeeping for the session. Safe to call repeatedly.
    pub async fn cleanup(&self, session: &SessionName) {
        if let Some(state) = self.states.lock().await.remove(session) {
            if let Some(pending) = state.pending {
                pending.task.abort();
            }
        }
    }

    pub async fn attempt_count(&self, session: &SessionName) -> u32 {
        self.states
            .lock()
            .await
            .get(session)
            .map(|s| s.attempt_count)
            .unwrap_or(0)
    }

    pub async fn has_pending(&self, session: &SessionName) -> bool {
        self.states
            .lock()
            .await
            .get(session)
            .map(|s| s.pending.as_ref().is_some_and(|p| !p.task.is_finished()))
            .unwrap_or(false)
    }

    fn ceiling_reason(&self) -> String {
        format!(
            "Maximum reconnection attempts ({}) reached",
            self.policy.max_attempts
        )
    }
}

async fn run_retry(
    states: Arc<Mutex<HashMap<SessionName, ReconnectState>>>,
    session: SessionName,
    timer_id: u64,
    delay: Duration,
    retry: RetryFn,
) {
    tokio::time::sleep(delay).await;
    tracing::debug!(session = %session, "Reconnect timer fired");
    let result = retry().await;

    let mut states = states.lock().await;
    let Some(state) = states.get_mut(&session) else {
        return;
    };
    if state.pending.as_ref().map(|p| p.timer_id) == Some(timer_id) {
        state.pending = None;
    }
    match result {
        Ok(()) => {
            state.attempt_count = 0;
            tracing::info!(session = %session, "Reconnect succeeded");
        }
        Err(e) => {
            tracing::warn!(
                session = %session,
                attempts = state.attempt_count,
                error = %e,
                "Reconnect attempt failed"
            );
        }
    }
}
