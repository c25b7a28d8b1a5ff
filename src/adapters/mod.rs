//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the session core to external systems:
//! - `transport` - Simulated messaging transport
//! - `storage` - Session credentials and settings (file, in-memory)
//! - `webhook` - Webhook delivery (HTTP, in-memory)
//! - `broadcast` - Dashboard fan-out

pub mod broadcast;
pub mod storage;
pub mod transport;
pub mod webhook;

pub use broadcast::{ChannelBroadcaster, GatewayEvent};
pub use storage::{FileSessionStore, InMemorySessionStore};
pub use transport::{ProbeBehavior, ScriptMode, SimulatedTransport};
pub use webhook::{HttpWebhookConfig, HttpWebhookDispatcher, InMemoryWebhookDispatcher};
