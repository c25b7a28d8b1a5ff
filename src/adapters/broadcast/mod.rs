//! Broadcast Adapters
//!
//! - **ChannelBroadcaster** - State, deletion and pairing-code fan-out over
//!   `tokio::sync::broadcast`

mod channel_broadcaster;

pub use channel_broadcaster::{ChannelBroadcaster, GatewayEvent, DEFAULT_BROADCAST_CAPACITY};
