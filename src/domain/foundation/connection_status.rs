//! ConnectionStatus enum: the per-session connection lifecycle.
//!
//! ```text
//! Creating -> Connecting -> {AwaitingPairing | GeneratingQr}
//!          -> Connecting (code entered) -> Connected -> Disconnected
//!          -> Connecting again, or terminal Error / PairingFailed
//!
//! Connected --(post-pairing restart)--> Restarting -> Connecting -> Connected
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::StateMachine;

/// Lifecycle status of a session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    #[default]
    Creating,
    Connecting,
    AwaitingPairing,
    GeneratingQr,
    Connected,
    Disconnected,
    Restarting,
    Error,
    PairingFailed,
}

impl ConnectionStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ConnectionStatus; 9] = [
        ConnectionStatus::Creating,
        ConnectionStatus::Connecting,
        ConnectionStatus::AwaitingPairing,
        ConnectionStatus::GeneratingQr,
        ConnectionStatus::Connected,
        ConnectionStatus::Disconnected,
        ConnectionStatus::Restarting,
        ConnectionStatus::Error,
        ConnectionStatus::PairingFailed,
    ];

    /// True while the user is expected to act on pairing material.
    pub fn is_pairing(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::AwaitingPairing | ConnectionStatus::GeneratingQr
        )
    }

    /// Returns the wire name used in broadcasts and webhooks.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Creating => "CREATING",
            ConnectionStatus::Connecting => "CONNECTING",
            ConnectionStatus::AwaitingPairing => "AWAITING_PAIRING",
            ConnectionStatus::GeneratingQr => "GENERATING_QR",
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Disconnected => "DISCONNECTED",
            ConnectionStatus::Restarting => "RESTARTING",
            ConnectionStatus::Error => "ERROR",
            ConnectionStatus::PairingFailed => "PAIRING_FAILED",
        }
    }
}

impl StateMachine for ConnectionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionStatus::*;
        match self {
            Creating => vec![Connecting, Error],
            Connecting => vec![
                Connecting,
                AwaitingPairing,
                GeneratingQr,
                Connected,
                Disconnected,
                Restarting,
                Error,
                PairingFailed,
            ],
            AwaitingPairing => vec![
                AwaitingPairing,
                GeneratingQr,
                Connecting,
                Connected,
                Disconnected,
                Restarting,
                Error,
                PairingFailed,
            ],
            GeneratingQr => vec![
                GeneratingQr,
                AwaitingPairing,
                Connecting,
                Connected,
                Disconnected,
                Restarting,
                Error,
            ],
            Connected => vec![Connecting, Disconnected, Restarting, Error, PairingFailed],
            Disconnected => vec![Connecting, Disconnected, Restarting, Error, PairingFailed],
            Restarting => vec![Connecting, Disconnected, Error, PairingFailed],
            Error | PairingFailed => vec![],
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_creating() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Creating);
    }

    #[test]
    fn error_and_pairing_failed_are_terminal() {
        assert!(ConnectionStatus::Error.is_terminal());
        assert!(ConnectionStatus::PairingFailed.is_terminal());
        for status in ConnectionStatus::ALL {
            if !matches!(status, ConnectionStatus::Error | ConnectionStatus::PairingFailed) {
                assert!(!status.is_terminal(), "{status} should not be terminal");
            }
        }
    }

    #[test]
    fn phone_pairing_happy_path_is_valid() {
        use ConnectionStatus::*;
        let path = [
            Creating,
            Connecting,
            AwaitingPairing,
            Connecting,
            Connected,
            Restarting,
            Connecting,
            Connected,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(&pair[1]),
                "{:?} -> {:?} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn creating_cannot_jump_to_connected() {
        assert!(ConnectionStatus::Creating
            .transition_to(ConnectionStatus::Connected)
            .is_err());
    }

    #[test]
    fn connected_cannot_go_back_to_pairing() {
        assert!(!ConnectionStatus::Connected.can_transition_to(&ConnectionStatus::GeneratingQr));
        assert!(!ConnectionStatus::Connected.can_transition_to(&ConnectionStatus::AwaitingPairing));
    }

    #[test]
    fn pairing_states_are_flagged() {
        assert!(ConnectionStatus::AwaitingPairing.is_pairing());
        assert!(ConnectionStatus::GeneratingQr.is_pairing());
        assert!(!ConnectionStatus::Connecting.is_pairing());
    }

    #[test]
    fn serializes_to_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&ConnectionStatus::AwaitingPairing).unwrap(),
            "\"AWAITING_PAIRING\""
        );
        let status: ConnectionStatus = serde_json::from_str("\"PAIRING_FAILED\"").unwrap();
        assert_eq!(status, ConnectionStatus::PairingFailed);
    }

    #[test]
    fn display_matches_wire_name() {
        for status in ConnectionStatus::ALL {
            assert_eq!(status.to_string(), status.as_str());
        }
    }
}
