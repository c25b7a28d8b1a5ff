//! Channel Broadcaster - dashboard fan-out over a tokio broadcast channel.
//!
//! Every subscriber receives every [`GatewayEvent`]. A subscriber that falls
//! more than `capacity` events behind gets `RecvError::Lagged` and skips
//! ahead; senders never wait.
//!
//! ```text
//! SessionManager ──► ChannelBroadcaster ──┬──► dashboard client
//!                                         ├──► logger
//!                                         └──► ...
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use crate::domain::session::{PairingUpdate, SessionDeleted, SessionStateChanged};
use crate::ports::{PairingNotifier, StateBroadcaster};

/// Default number of events buffered per subscriber.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 128;

/// Everything the dashboard is told about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    StateChanged(SessionStateChanged),
    SessionDeleted(SessionDeleted),
    PairingCode(PairingUpdate),
}

/// Implements both outbound notification ports on one channel.
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<GatewayEvent>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: GatewayEvent) {
        if self.sender.send(event).is_err() {
            tracing::debug!("No subscribers for gateway event");
        }
    }
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl StateBroadcaster for ChannelBroadcaster {
    fn state_changed(&self, update: SessionStateChanged) {
        self.publish(GatewayEvent::StateChanged(update));
    }

    fn session_deleted(&self, update: SessionDeleted) {
        self.publish(GatewayEvent::SessionDeleted(update));
    }
}

impl PairingNotifier for ChannelBroadcaster {
    fn pairing_code_issued(&self, update: PairingUpdate) {
        self.publish(GatewayEvent::PairingCode(update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ConnectionStatus, SessionName, Timestamp};
    use crate::domain::session::StateChange;

    fn s1() -> SessionName {
        SessionName::new("S1").unwrap()
    }

    #[tokio::test]
    async fn every_subscriber_receives_updates() {
        let broadcaster = ChannelBroadcaster::with_default_capacity();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        let change = StateChange::new(ConnectionStatus::Connected, "Connected");
        broadcaster.state_changed(SessionStateChanged::from_change(s1(), &change));

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                GatewayEvent::StateChanged(update) => {
                    assert_eq!(update.status, ConnectionStatus::Connected)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let broadcaster = ChannelBroadcaster::new(4);
        broadcaster.session_deleted(SessionDeleted {
            session_name: s1(),
            timestamp: Timestamp::now(),
        });
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = GatewayEvent::PairingCode(PairingUpdate {
            session_name: s1(),
            phone_number: "+15551234".into(),
            pairing_code: "ABCD-1234".into(),
            timestamp: Timestamp::now(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "pairing_code");
        assert_eq!(value["data"]["pairingCode"], "ABCD-1234");
    }
}
