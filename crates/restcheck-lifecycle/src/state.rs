//! Run-level lifecycle state machine.
//!
//! `Idle -> SuiteConfigured -> RunStarted -> RunFinished -> Idle`. A run may
//! also start straight from `Idle`, and `RunStarted` may be re-entered.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    SuiteConfigured,
    RunStarted,
    RunFinished,
}

impl LifecycleState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Idle, SuiteConfigured)
                | (SuiteConfigured, SuiteConfigured)
                | (Idle, RunStarted)
                | (SuiteConfigured, RunStarted)
                | (RunStarted, RunStarted)
                | (RunStarted, RunFinished)
                | (RunFinished, Idle)
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Idle => write!(f, "idle"),
            LifecycleState::SuiteConfigured => write!(f, "suite_configured"),
            LifecycleState::RunStarted => write!(f, "run_started"),
            LifecycleState::RunFinished => write!(f, "run_finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LifecycleState::*;
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(Idle.can_transition_to(SuiteConfigured));
        assert!(SuiteConfigured.can_transition_to(RunStarted));
        assert!(RunStarted.can_transition_to(RunFinished));
        assert!(RunFinished.can_transition_to(Idle));
    }

    #[test]
    fn test_rerun_tolerance() {
        assert!(RunStarted.can_transition_to(RunStarted));
        assert!(Idle.can_transition_to(RunStarted));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Idle.can_transition_to(RunFinished));
        assert!(!SuiteConfigured.can_transition_to(RunFinished));
        assert!(!RunFinished.can_transition_to(RunStarted));
        assert!(!RunFinished.can_transition_to(RunFinished));
        assert!(!RunStarted.can_transition_to(Idle));
    }
}
