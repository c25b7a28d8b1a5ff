//! The session registry and the observer that writes into it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::connection::{ConnectionHandler, SessionObserver, SocketManager};
use crate::domain::foundation::SessionName;
use crate::domain::session::{
    InboundMessage, PairingUpdate, Session, SessionSettings, SessionStateChanged, StateChange,
    WebhookEvent,
};
use crate::ports::{PairingNotifier, StateBroadcaster, WebhookDispatcher, WebhookError};

/// The live socket/handler pair of one session.
#[derive(Clone)]
pub(crate) struct SessionRuntime {
    pub socket: Arc<SocketManager>,
    pub handler: Arc<ConnectionHandler>,
}

impl SessionRuntime {
    /// Tears the pair down. Safe to repeat.
    pub async fn shutdown(&self) {
        self.handler.cleanup().await;
        self.socket.close().await;
    }
}

pub(crate) struct SessionEntry {
    pub session: Session,
    pub settings: SessionSettings,
    pub runtime: Option<SessionRuntime>,
    /// Fingerprint of the last dispatched state webhook.
    pub last_webhook: Option<String>,
}

pub(crate) type Registry = RwLock<HashMap<SessionName, SessionEntry>>;

/// Applies handler output to the registry and fans it out.
pub(crate) struct RegistryObserver {
    registry: Arc<Registry>,
    broadcaster: Arc<dyn StateBroadcaster>,
    webhooks: Arc<dyn WebhookDispatcher>,
    pairing_notifier: Arc<dyn PairingNotifier>,
}

impl RegistryObserver {
    pub fn new(
        registry: Arc<Registry>,
        broadcaster: Arc<dyn StateBroadcaster>,
        webhooks: Arc<dyn WebhookDispatcher>,
        pairing_notifier: Arc<dyn PairingNotifier>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            webhooks,
            pairing_notifier,
        }
    }
}

#[async_trait]
impl SessionObserver for RegistryObserver {
    async fn on_state_change(&self, session: &SessionName, change: StateChange) {
        {
            let mut registry = self.registry.write().await;
            let Some(entry) = registry.get_mut(session) else {
                tracing::debug!(session = %session, "State change for unregistered session dropped");
                return;
            };
            entry.session.apply(&change);
        }
        self.broadcaster
            .state_changed(SessionStateChanged::from_change(session.clone(), &change));
    }

    async fn on_pairing_update(&self, update: PairingUpdate) {
        self.pairing_notifier.pairing_code_issued(update);
    }

    async fn on_webhook_event(&self, event: WebhookEvent) {
        let target = {
            let mut registry = self.registry.write().await;
            let Some(entry) = registry.get_mut(&event.session_name) else {
                return;
            };
            if !entry.settings.wants(event.event) {
                return;
            }
            if event.event.suppresses_repeats() {
                let fingerprint = event.fingerprint();
                if entry.last_webhook.as_deref() == Some(fingerprint.as_str()) {
                    tracing::debug!(
                        session = %event.session_name,
                        event = %event.event,
                        "Suppressing repeated webhook"
                    );
                    return;
                }
                entry.last_webhook = Some(fingerprint);
            }
            entry.settings.webhook_url.clone()
        };

        match self.webhooks.dispatch(event, target.as_deref()).await {
            Ok(()) => {}
            Err(WebhookError::NoTarget) => tracing::debug!("No webhook target configured"),
            Err(e) => tracing::warn!(error = %e, "Webhook dispatch failed"),
        }
    }

    async fn on_message(&self, message: InboundMessage) {
        let target = self
            .registry
            .read()
            .await
            .get(&message.session_name)
            .and_then(|entry| entry.settings.webhook_url.clone());
        match self.webhooks.forward_message(message, target.as_deref()).await {
            Ok(()) => {}
            Err(WebhookError::NoTarget) => tracing::debug!("No webhook target for message"),
            Err(e) => tracing::warn!(error = %e, "Message forwarding failed"),
        }
    }

    async fn is_registered(&self, session: &SessionName) -> bool {
        self.registry.read().await.contains_key(session)
    }
}
