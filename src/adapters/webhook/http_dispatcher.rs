//! HTTP Webhook Dispatcher - POSTs lifecycle events as signed JSON.
//!
//! Deliveries are queued on a bounded channel and drained by one worker
//! task, so dispatching never waits on the network. A full queue drops the
//! delivery with an error instead of blocking the session.
//!
//! # Signing
//!
//! With a secret configured, every request carries
//! `X-Webhook-Signature: sha256=<hex HMAC-SHA256 of the body>`.
//!
//! ```ignore
//! let config = HttpWebhookConfig::new()
//!     .with_url("https://hooks.example.com/sessions")
//!     .with_secret("whsec_local");
//! let dispatcher = HttpWebhookDispatcher::new(config)?;
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::domain::session::{InboundMessage, WebhookEvent};
use crate::ports::{WebhookDispatcher, WebhookError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Configuration for the HTTP dispatcher.
#[derive(Debug, Clone)]
pub struct HttpWebhookConfig {
    /// Default target; sessions may override it.
    pub url: Option<String>,
    /// Signing secret.
    secret: Option<SecretString>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Deliveries that may wait in the queue.
    pub queue_capacity: usize,
}

impl Default for HttpWebhookConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpWebhookConfig {
    pub fn new() -> Self {
        Self {
            url: None,
            secret: None,
            timeout: Duration::from_secs(10),
            queue_capacity: 256,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::new(secret.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// One queued HTTP delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Delivery {
    url: String,
    body: String,
    signature: Option<String>,
    label: String,
}

/// Webhook dispatcher backed by `reqwest`.
pub struct HttpWebhookDispatcher {
    default_url: Option<String>,
    secret: Option<SecretString>,
    queue: mpsc::Sender<Delivery>,
}

impl HttpWebhookDispatcher {
    /// Builds the client and spawns the delivery worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(config: HttpWebhookConfig) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;
        let (queue, rx) = mpsc::channel(config.queue_capacity.max(1));
        tokio::spawn(run_worker(client, rx));

        Ok(Self {
            default_url: config.url,
            secret: config.secret,
            queue,
        })
    }

    fn prepare(
        &self,
        body: String,
        target: Option<&str>,
        label: String,
    ) -> Result<Delivery, WebhookError> {
        let url = target
            .map(String::from)
            .or_else(|| self.default_url.clone())
            .ok_or(WebhookError::NoTarget)?;
        let signature = self
            .secret
            .as_ref()
            .map(|secret| sign(secret.expose_secret(), body.as_bytes()));
        Ok(Delivery {
            url,
            body,
            signature,
            label,
        })
    }

    fn enqueue(&self, delivery: Delivery) -> Result<(), WebhookError> {
        self.queue.try_send(delivery).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WebhookError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => WebhookError::Closed,
        })
    }
}

#[async_trait]
impl WebhookDispatcher for HttpWebhookDispatcher {
    async fn dispatch(
        &self,
        event: WebhookEvent,
        target: Option<&str>,
    ) -> Result<(), WebhookError> {
        let body = serde_json::to_string(&event)
            .map_err(|e| WebhookError::Serialization(e.to_string()))?;
        let label = format!("{} {}", event.session_name, event.event);
        let delivery = self.prepare(body, target, label)?;
        self.enqueue(delivery)
    }

    async fn forward_message(
        &self,
        message: InboundMessage,
        target: Option<&str>,
    ) -> Result<(), WebhookError> {
        let body = serde_json::to_string(&message)
            .map_err(|e| WebhookError::Serialization(e.to_string()))?;
        let label = format!("{} message", message.session_name);
        let delivery = self.prepare(body, target, label)?;
        self.enqueue(delivery)
    }
}

async fn run_worker(client: Client, mut queue: mpsc::Receiver<Delivery>) {
    while let Some(delivery) = queue.recv().await {
        let mut request = client
            .post(&delivery.url)
            .header(CONTENT_TYPE, "application/json")
            .body(delivery.body);
        if let Some(signature) = delivery.signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(webhook = %delivery.label, "Webhook delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    webhook = %delivery.label,
                    status = %response.status(),
                    "Webhook rejected by receiver"
                );
            }
            Err(e) => {
                tracing::warn!(webhook = %delivery.label, error = %e, "Webhook delivery failed");
            }
        }
    }
}

/// `sha256=<hex>` signature of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex_encode(&mac.finalize().into_bytes()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
