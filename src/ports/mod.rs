//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the session core and the outside world. Adapters implement these ports.
//!
//! ## Connection Ports
//!
//! - `Transport` - Opens protocol connections and reports their events
//! - `TransportHandle` - Controls one open connection
//!
//! ## Persistence Ports
//!
//! - `SessionStore` - Credentials and settings per session
//!
//! ## Notification Ports
//!
//! - `WebhookDispatcher` - Lifecycle webhooks and forwarded messages
//! - `StateBroadcaster` - Live state fan-out to dashboards
//! - `PairingNotifier` - Pairing-code delivery to the end user

mod pairing_notifier;
mod session_store;
mod state_broadcaster;
mod transport;
mod webhook_dispatcher;

pub use pairing_notifier::PairingNotifier;
pub use session_store::{SessionStore, StoreError};
pub use state_broadcaster::StateBroadcaster;
pub use transport::{
    ConnectionState, CredentialMaterial, Transport, TransportConnection, TransportError,
    TransportEvent, TransportHandle, TransportIdentity,
};
pub use webhook_dispatcher::{WebhookDispatcher, WebhookError};
