//! In-Memory Webhook Dispatcher - records instead of delivering.
//!
//! Useful for tests and for running without a webhook receiver.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::session::{InboundMessage, WebhookEvent, WebhookEventKind};
use crate::ports::{WebhookDispatcher, WebhookError};

/// A recorded dispatch and the target it was meant for.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedWebhook {
    pub event: WebhookEvent,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookDispatcher {
    events: Arc<RwLock<Vec<DispatchedWebhook>>>,
    messages: Arc<RwLock<Vec<InboundMessage>>>,
}

impl InMemoryWebhookDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dispatched(&self) -> Vec<DispatchedWebhook> {
        self.events.read().await.clone()
    }

    /// Kinds of every dispatched event, in order.
    pub async fn kinds(&self) -> Vec<WebhookEventKind> {
        self.events.read().await.iter().map(|d| d.event.event).collect()
    }

    pub async fn forwarded(&self) -> Vec<InboundMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl WebhookDispatcher for InMemoryWebhookDispatcher {
    async fn dispatch(
        &self,
        event: WebhookEvent,
        target: Option<&str>,
    ) -> Result<(), WebhookError> {
        tracing::debug!(session = %event.session_name, event = %event.event, "Recorded webhook");
        self.events.write().await.push(DispatchedWebhook {
            event,
            target: target.map(String::from),
        });
        Ok(())
    }

    async fn forward_message(
        &self,
        message: InboundMessage,
        _target: Option<&str>,
    ) -> Result<(), WebhookError> {
        self.messages.write().await.push(message);
        Ok(())
    }
}
