//! Pairing-code formatting and request de-duplication policy.

use std::time::Duration;

/// Default window during which repeat pairing-code requests reuse the
/// cached code.
pub const DEFAULT_PAIRING_DEDUP_WINDOW: Duration = Duration::from_secs(5);

/// Separator inserted at the midpoint of a pairing code.
pub const PAIRING_CODE_SEPARATOR: char = '-';

/// Pairing-code request tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingPolicy {
    pub dedup_window: Duration,
}

impl Default for PairingPolicy {
    fn default() -> Self {
        Self {
            dedup_window: DEFAULT_PAIRING_DEDUP_WINDOW,
        }
    }
}

/// Formats a raw pairing code for display: `ABCD1234` -> `ABCD-1234`.
///
/// Existing separators and whitespace are dropped and letters upper-cased
/// before the code is split at its midpoint.
pub fn format_pairing_code(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.len() < 2 {
        return cleaned;
    }
    let (head, tail) = cleaned.split_at(cleaned.len() / 2);
    format!("{}{}{}", head, PAIRING_CODE_SEPARATOR, tail)
}
