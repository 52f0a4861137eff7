//! State machine trait for lifecycle status enums.

use super::{DomainError, ErrorCode};

/// Trait for status enums that represent state machines.
///
/// Implementors list their edges once; validated transitions and terminal
/// detection come for free.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, DomainError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot transition from {:?} to {:?}", self, target),
            )
            .with_detail("from", format!("{:?}", self))
            .with_detail("to", format!("{:?}", target)))
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
    enum Light {
        Pending,
        On,
        Off,
    }

    impl StateMachine for Light {
        fn can_transition_to(&self, target: &Self) -> bool {
            matches!((self, target), (Light::Pending, Light::On) | (Light::On, Light::Off))
        }

        fn valid_transitions(&self) -> Vec<Self> {
            match self {
                Light::Pending => vec![Light::On],
                Light::On => vec![Light::Off],
                Light::Off => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_valid_edge() {
        assert_eq!(Light::Pending.transition_to(Light::On), Ok(Light::On));
    }

    #[test]
    fn transition_to_reports_invalid_state_transition() {
        let err = Light::Off.transition_to(Light::On).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(err.details.get("from"), Some(&"Off".to_string()));
    }

    #[test]
    fn terminal_state_has_no_edges() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::On.is_terminal());
    }
}
