//! Pairing Notifier Port - tells the end user which code to type.

use crate::domain::session::PairingUpdate;

/// Port for delivering freshly issued pairing codes.
pub trait PairingNotifier: Send + Sync {
    fn pairing_code_issued(&self, update: PairingUpdate);
}
