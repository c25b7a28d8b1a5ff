//! State Broadcaster Port - fan-out of session changes to dashboards.

use crate::domain::session::{SessionDeleted, SessionStateChanged};

/// Port for broadcasting session state to any number of listeners.
///
/// Calls are synchronous and must not block; listeners that lag simply
/// miss updates.
pub trait StateBroadcaster: Send + Sync {
    fn state_changed(&self, update: SessionStateChanged);

    fn session_deleted(&self, update: SessionDeleted);
}
