//! Webhook Dispatcher Port - outbound lifecycle notifications.
//!
//! Dispatch is fire-and-forget from the caller's point of view: an
//! implementation may queue and deliver later, and delivery failures never
//! reach the session state machine.

use async_trait::async_trait;

use crate::domain::session::{InboundMessage, WebhookEvent};

/// Errors from webhook dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("No webhook target configured")]
    NoTarget,

    #[error("Webhook queue is full")]
    QueueFull,

    #[error("Webhook dispatcher is closed")]
    Closed,

    #[error("Failed to serialize webhook payload: {0}")]
    Serialization(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Port for delivering webhook notifications.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    /// Sends a lifecycle event. `target` overrides the configured URL.
    async fn dispatch(&self, event: WebhookEvent, target: Option<&str>)
        -> Result<(), WebhookError>;

    /// Forwards an inbound application message unmodified.
    async fn forward_message(
        &self,
        message: InboundMessage,
        target: Option<&str>,
    ) -> Result<(), WebhookError>;
}
