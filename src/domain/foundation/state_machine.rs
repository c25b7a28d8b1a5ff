//! State machine trait for status enums.
//!
//! Gives lifecycle enums a single place to declare their legal transitions
//! and a validated `transition_to` for free.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// # Example
///
/// ```ignore
/// let next = ConnectionStatus::Connected.transition_to(ConnectionStatus::Disconnected)?;
/// assert!(ConnectionStatus::PairingFailed.is_terminal());
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Probe {
        Idle,
        Running,
        Done,
    }

    impl StateMachine for Probe {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Probe::Idle => vec![Probe::Running],
                Probe::Running => vec![Probe::Running, Probe::Done],
                Probe::Done => vec![],
            }
        }
    }

    #[test]
    fn transition_to_returns_target_when_allowed() {
        assert_eq!(Probe::Idle.transition_to(Probe::Running), Ok(Probe::Running));
        assert_eq!(Probe::Running.transition_to(Probe::Running), Ok(Probe::Running));
    }

    #[test]
    fn transition_to_names_both_states_when_rejected() {
        let err = Probe::Idle.transition_to(Probe::Done).unwrap_err();
        assert!(err.to_string().contains("Idle"));
        assert!(err.to_string().contains("Done"));
    }

    #[test]
    fn only_states_without_exits_are_terminal() {
        assert!(Probe::Done.is_terminal());
        assert!(!Probe::Idle.is_terminal());
        assert!(!Probe::Running.is_terminal());
    }
}
