//! Disconnect cause classification.
//!
//! Every transport close carries an optional numeric cause code. The code is
//! classified into one of three kinds:
//!
//! - **Fatal**: the remote side will never accept this session again
//!   (credentials rejected, forbidden, device limit exceeded).
//! - **ExpectedRestart**: a stream-restart code seen shortly after the user
//!   entered a pairing code. The transport deliberately drops the link after
//!   a device is linked and expects an immediate reconnect.
//! - **Transient**: everything else; retried under backoff.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Well-known disconnect cause codes reported by the transport.
pub mod codes {
    /// Stored credentials were rejected (device logged out remotely).
    pub const CREDENTIALS_REJECTED: u16 = 401;
    /// The account is not allowed to connect.
    pub const FORBIDDEN: u16 = 403;
    /// Connection timed out or was lost.
    pub const CONNECTION_LOST: u16 = 408;
    /// Too many linked devices / multi-device mismatch.
    pub const DEVICE_LIMIT_EXCEEDED: u16 = 411;
    /// The remote side closed the stream.
    pub const CONNECTION_CLOSED: u16 = 428;
    /// Another client took over this session.
    pub const CONNECTION_REPLACED: u16 = 440;
    /// Local session state is corrupt.
    pub const BAD_SESSION: u16 = 500;
    /// Remote service temporarily unavailable.
    pub const SERVICE_UNAVAILABLE: u16 = 503;
    /// The stream must be restarted (sent right after a successful link).
    pub const RESTART_REQUIRED: u16 = 515;
}

/// Codes that are never retried.
pub const FATAL_CODES: [u16; 3] = [
    codes::CREDENTIALS_REJECTED,
    codes::FORBIDDEN,
    codes::DEVICE_LIMIT_EXCEEDED,
];

/// Codes that signal an expected restart when seen inside the pairing window.
pub const RESTART_CODES: [u16; 2] = [codes::RESTART_REQUIRED, codes::CONNECTION_CLOSED];

/// Why the transport closed a connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisconnectCause {
    /// Numeric cause code, if the transport reported one.
    pub code: Option<u16>,
    /// Free-text message from the transport.
    pub message: Option<String>,
}

impl DisconnectCause {
    pub fn with_code(code: u16) -> Self {
        Self {
            code: Some(code),
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: Some(message.into()),
        }
    }

    /// Attaches a message to a coded cause.
    pub fn and_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Human-readable reason, preferring the known text for the code.
    pub fn reason_text(&self) -> String {
        if let Some(text) = self.code.and_then(reason_for_code) {
            return text.to_string();
        }
        match (self.code, self.message.as_deref()) {
            (_, Some(message)) if !message.is_empty() => message.to_string(),
            (Some(code), _) => format!("Disconnected with code {}", code),
            (None, _) => "Connection closed".to_string(),
        }
    }
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({})", self.reason_text(), code),
            None => write!(f, "{}", self.reason_text()),
        }
    }
}

/// Fixed reason text for known codes.
pub fn reason_for_code(code: u16) -> Option<&'static str> {
    let text = match code {
        codes::CREDENTIALS_REJECTED => "Credentials rejected, device was logged out",
        codes::FORBIDDEN => "Access forbidden",
        codes::CONNECTION_LOST => "Connection lost",
        codes::DEVICE_LIMIT_EXCEEDED => "Linked device limit exceeded",
        codes::CONNECTION_CLOSED => "Connection closed by remote",
        codes::CONNECTION_REPLACED => "Connection replaced by another client",
        codes::BAD_SESSION => "Bad session state",
        codes::SERVICE_UNAVAILABLE => "Service unavailable",
        codes::RESTART_REQUIRED => "Stream restart required",
        _ => return None,
    };
    Some(text)
}

/// True if the code is in the fixed fatal set.
pub fn is_fatal_code(code: u16) -> bool {
    FATAL_CODES.contains(&code)
}

/// The moment a user entered a pairing code, together with how long a
/// restart after it counts as expected.
///
/// The same value is recorded by the connection handler and consumed by the
/// reconnect classifier, so both sides agree on one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingWindow {
    pub entered_at: Instant,
    pub length: Duration,
}

impl PairingWindow {
    pub fn new(entered_at: Instant, length: Duration) -> Self {
        Self { entered_at, length }
    }

    /// True if `now` lies within the window.
    pub fn contains(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.entered_at) <= self.length
    }
}

/// Classification of a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectKind {
    Fatal,
    Transient,
    ExpectedRestart,
}

/// Classifies a cause at `now`, given the pairing window if one is open.
///
/// Fatal codes are fatal regardless of pairing history.
pub fn classify(
    cause: &DisconnectCause,
    pairing: Option<PairingWindow>,
    now: Instant,
) -> DisconnectKind {
    match cause.code {
        Some(code) if is_fatal_code(code) => DisconnectKind::Fatal,
        Some(code)
            if RESTART_CODES.contains(&code)
                && pairing.map(|w| w.contains(now)).unwrap_or(false) =>
        {
            DisconnectKind::ExpectedRestart
        }
        _ => DisconnectKind::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINDOW: Duration = Duration::from_secs(10);

    #[test]
    fn fatal_codes_are_fatal_without_pairing() {
        let now = Instant::now();
        for code in FATAL_CODES {
            assert_eq!(
                classify(&DisconnectCause::with_code(code), None, now),
                DisconnectKind::Fatal
            );
        }
    }

    #[test]
    fn fatal_codes_stay_fatal_inside_pairing_window() {
        let now = Instant::now();
        let window = PairingWindow::new(now, WINDOW);
        for code in FATAL_CODES {
            assert_eq!(
                classify(&DisconnectCause::with_code(code), Some(window), now),
                DisconnectKind::Fatal
            );
        }
    }

    #[test]
    fn restart_code_inside_window_is_expected() {
        let entered = Instant::now();
        let window = PairingWindow::new(entered, WINDOW);
        let cause = DisconnectCause::with_code(codes::RESTART_REQUIRED);
        assert_eq!(
            classify(&cause, Some(window), entered + Duration::from_secs(3)),
            DisconnectKind::ExpectedRestart
        );
    }

    #[test]
    fn restart_code_outside_window_is_transient() {
        let entered = Instant::now();
        let window = PairingWindow::new(entered, WINDOW);
        let cause = DisconnectCause::with_code(codes::RESTART_REQUIRED);
        assert_eq!(
            classify(&cause, Some(window), entered + Duration::from_secs(11)),
            DisconnectKind::Transient
        );
        assert_eq!(classify(&cause, None, entered), DisconnectKind::Transient);
    }

    #[test]
    fn uncoded_cause_is_transient() {
        let cause = DisconnectCause::with_message("socket hang up");
        assert_eq!(classify(&cause, None, Instant::now()), DisconnectKind::Transient);
        assert_eq!(cause.reason_text(), "socket hang up");
    }

    #[test]
    fn reason_text_prefers_known_code_text() {
        let cause = DisconnectCause::with_code(codes::CREDENTIALS_REJECTED).and_message("401");
        assert_eq!(cause.reason_text(), "Credentials rejected, device was logged out");
        assert_eq!(
            DisconnectCause::with_code(999).reason_text(),
            "Disconnected with code 999"
        );
        assert_eq!(DisconnectCause::default().reason_text(), "Connection closed");
    }

    #[test]
    fn display_includes_code() {
        let cause = DisconnectCause::with_code(codes::CONNECTION_LOST);
        assert_eq!(cause.to_string(), "Connection lost (408)");
    }

    proptest! {
        #[test]
        fn every_non_fatal_code_is_retryable(code in any::<u16>()) {
            prop_assume!(!FATAL_CODES.contains(&code));
            let kind = classify(&DisconnectCause::with_code(code), None, Instant::now());
            prop_assert_eq!(kind, DisconnectKind::Transient);
        }

        #[test]
        fn fatal_set_membership_decides_fatality(code in any::<u16>(), paired in any::<bool>()) {
            let now = Instant::now();
            let window = paired.then(|| PairingWindow::new(now, WINDOW));
            let kind = classify(&DisconnectCause::with_code(code), window, now);
            prop_assert_eq!(kind == DisconnectKind::Fatal, is_fatal_code(code));
        }
    }
}
