//! Listener interface a connection handler reports to.

use async_trait::async_trait;

use crate::domain::foundation::SessionName;
use crate::domain::session::{InboundMessage, PairingUpdate, StateChange, WebhookEvent};

/// Receives everything a connection handler produces.
///
/// The session registry implements this; tests plug in recorders.
#[async_trait]
pub trait SessionObserver: Send + Sync {
    /// A validated state transition for `session`.
    async fn on_state_change(&self, session: &SessionName, change: StateChange);

    /// A fresh pairing code for the end user.
    async fn on_pairing_update(&self, update: PairingUpdate);

    /// A lifecycle notification for the webhook collaborator.
    async fn on_webhook_event(&self, event: WebhookEvent);

    /// An inbound application message.
    async fn on_message(&self, message: InboundMessage);

    /// Whether `session` is still registered. Reconnects for unregistered
    /// sessions are skipped.
    async fn is_registered(&self, session: &SessionName) -> bool;
}
