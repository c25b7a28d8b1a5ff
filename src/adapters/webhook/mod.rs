//! Webhook Adapters
//!
//! - **HttpWebhookDispatcher** - Signed JSON POSTs from a bounded queue
//! - **InMemoryWebhookDispatcher** - Records dispatches (testing/development)

mod http_dispatcher;
mod in_memory;

pub use http_dispatcher::{sign, HttpWebhookConfig, HttpWebhookDispatcher, SIGNATURE_HEADER};
pub use in_memory::{DispatchedWebhook, InMemoryWebhookDispatcher};
