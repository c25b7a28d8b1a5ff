//! Reconnect policy and the exponential backoff curve.

use std::time::Duration;

/// Default delay before the first reconnect attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);
/// Default multiplier applied per attempt.
pub const DEFAULT_FACTOR: u32 = 2;
/// Default cap on a single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
/// Default number of scheduled attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default length of the post-pairing restart window.
pub const DEFAULT_POST_PAIRING_WINDOW: Duration = Duration::from_secs(10);

/// Tunables for reconnect decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay for attempt 0.
    pub initial_delay: Duration,
    /// Multiplier per prior attempt.
    pub factor: u32,
    /// Upper bound for any backoff delay.
    pub max_delay: Duration,
    /// Attempts allowed before scheduling is refused.
    pub max_attempts: u32,
    /// How long after "code entered" a restart code counts as expected.
    pub post_pairing_window: Duration,
    /// Delay used for expected post-pairing restarts.
    pub post_pairing_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            factor: DEFAULT_FACTOR,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            post_pairing_window: DEFAULT_POST_PAIRING_WINDOW,
            post_pairing_delay: Duration::ZERO,
        }
    }
}

impl ReconnectPolicy {
    /// `min(initial_delay * factor^attempt, max_delay)`, saturating.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial_delay.as_millis() as u64;
        let max_ms = self.max_delay.as_millis() as u64;
        let scaled = (self.factor as u64)
            .checked_pow(attempt)
            .and_then(|multiplier| initial_ms.checked_mul(multiplier))
            .unwrap_or(u64::MAX);
        Duration::from_millis(scaled.min(max_ms))
    }

    /// True once `attempt_count` scheduled attempts exhaust the ceiling.
    pub fn is_exhausted(&self, attempt_count: u32) -> bool {
        attempt_count >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_curve_doubles_from_five_seconds_and_caps_at_sixty() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..6)
            .map(|attempt| policy.delay_for(attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![5_000, 10_000, 20_000, 40_000, 60_000, 60_000]);
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(200), Duration::from_secs(60));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn exhaustion_starts_at_the_ceiling() {
        let policy = ReconnectPolicy::default();
        assert!(!policy.is_exhausted(9));
        assert!(policy.is_exhausted(10));
        assert!(policy.is_exhausted(11));
    }

    proptest! {
        #[test]
        fn delay_matches_closed_form(attempt in 0u32..64) {
            let policy = ReconnectPolicy::default();
            let expected = (5_000u128 * 2u128.pow(attempt)).min(60_000);
            prop_assert_eq!(policy.delay_for(attempt).as_millis(), expected);
        }

        #[test]
        fn delays_never_decrease(attempt in 0u32..1_000) {
            let policy = ReconnectPolicy::default();
            prop_assert!(policy.delay_for(attempt) <= policy.delay_for(attempt + 1));
        }
    }
}
