//! Capture state machine with validated transitions.
//!
//! Enforces the single-shot capture lifecycle:
//! - Idle -> Listening (capture session opened)
//! - Listening -> Idle (transcript received, error reported, or session released)

use std::fmt;

use legalhelp_core::error::LegalHelpError;

/// Listening state of the speech capture adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// No capture session is open.
    #[default]
    Idle,
    /// A capture session is open and waiting for speech.
    Listening,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Listening => write!(f, "Listening"),
        }
    }
}

impl CaptureState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &CaptureState) -> bool {
        matches!(
            (self, target),
            (CaptureState::Idle, CaptureState::Listening)
                | (CaptureState::Listening, CaptureState::Idle)
        )
    }
}

/// Owner of the current `CaptureState`.
///
/// All transitions are validated before being applied.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: CaptureState,
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> CaptureState {
        self.state
    }

    /// Attempt to transition to the target state.
    pub fn transition(&mut self, target: CaptureState) -> Result<(), LegalHelpError> {
        if self.state.can_transition_to(&target) {
            tracing::debug!("Capture state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(LegalHelpError::Capture(format!(
                "Invalid state transition: {} -> {}",
                self.state, target
            )))
        }
    }

    /// Force the state machine back to Idle.
    pub fn reset(&mut self) {
        if self.state != CaptureState::Idle {
            tracing::debug!("Capture state machine reset to Idle from {}", self.state);
        }
        self.state = CaptureState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(CaptureState::Idle.to_string(), "Idle");
        assert_eq!(CaptureState::Listening.to_string(), "Listening");
    }

    #[test]
    fn test_valid_transitions() {
        assert!(CaptureState::Idle.can_transition_to(&CaptureState::Listening));
        assert!(CaptureState::Listening.can_transition_to(&CaptureState::Idle));
    }

    #[test]
    fn test_self_transitions_are_invalid() {
        assert!(!CaptureState::Idle.can_transition_to(&CaptureState::Idle));
        assert!(!CaptureState::Listening.can_transition_to(&CaptureState::Listening));
    }

    #[test]
    fn test_state_machine_round_trip() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.current(), CaptureState::Idle);
        sm.transition(CaptureState::Listening).unwrap();
        assert_eq!(sm.current(), CaptureState::Listening);
        sm.transition(CaptureState::Idle).unwrap();
        assert_eq!(sm.current(), CaptureState::Idle);
    }

    #[test]
    fn test_double_start_is_rejected() {
        let mut sm = StateMachine::new();
        sm.transition(CaptureState::Listening).unwrap();
        let err = sm.transition(CaptureState::Listening).unwrap_err();
        assert!(err.to_string().contains("Listening -> Listening"));
        assert_eq!(sm.current(), CaptureState::Listening);
    }

    #[test]
    fn test_reset() {
        let mut sm = StateMachine::new();
        sm.transition(CaptureState::Listening).unwrap();
        sm.reset();
        assert_eq!(sm.current(), CaptureState::Idle);
        sm.reset();
        assert_eq!(sm.current(), CaptureState::Idle);
    }
}
