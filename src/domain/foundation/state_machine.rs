//! State machine trait for status enums.
//!
//! Gives lifecycle statuses a uniform way to declare and check their
//! transitions; `CampaignStatus` is the main implementor.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors declare their valid transitions and get a validated
/// `transition_to` for free.
///
/// ```ignore
/// let next = campaign.status.transition_to(CampaignStatus::Paused)?;
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
    enum Light {
        Green,
        Amber,
        Red,
        Off,
    }

    impl StateMachine for Light {
        fn can_transition_to(&self, target: &Self) -> bool {
            self.valid_transitions().contains(target)
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Light::*;
            match self {
                Green => vec![Amber, Off],
                Amber => vec![Red, Off],
                Red => vec![Green, Off],
                Off => vec![],
            }
        }
    }

    #[test]
    fn valid_transition_returns_target() {
        assert_eq!(Light::Green.transition_to(Light::Amber), Ok(Light::Amber));
    }

    #[test]
    fn invalid_transition_names_both_states() {
        let err = Light::Green.transition_to(Light::Red).unwrap_err();
        assert!(err.to_string().contains("Green"));
        assert!(err.to_string().contains("Red"));
    }

    #[test]
    fn state_without_exits_is_terminal() {
        assert!(Light::Off.is_terminal());
        assert!(!Light::Red.is_terminal());
    }
}
