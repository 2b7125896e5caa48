// src/runner/state.rs

use crate::errors::{Result, SetupError};

/// Lifecycle of one run.
///
/// `Idle -> Running -> {Completed, Failed, Cancelled}`; no state is entered
/// twice and terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Cancelled)
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        match (self, next) {
            (RunState::Idle, RunState::Running) => true,
            (RunState::Running, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Process exit code for a finished run: 0 completed, 130 cancelled,
    /// 1 otherwise.
    pub fn exit_code(self) -> i32 {
        match self {
            RunState::Completed => 0,
            RunState::Cancelled => 130,
            _ => 1,
        }
    }

    /// Checked transition.
    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(SetupError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        let mut state = RunState::default();
        state.advance(RunState::Running).unwrap();
        state.advance(RunState::Cancelled).unwrap();
        assert!(state.is_terminal());
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [RunState::Completed, RunState::Failed, RunState::Cancelled] {
            let mut state = terminal;
            for next in [
                RunState::Idle,
                RunState::Running,
                RunState::Completed,
                RunState::Failed,
                RunState::Cancelled,
            ] {
                assert!(state.advance(next).is_err(), "{terminal:?} -> {next:?}");
            }
        }
    }

    #[test]
    fn idle_cannot_skip_running() {
        let mut state = RunState::Idle;
        let err = state.advance(RunState::Completed).unwrap_err();
        assert!(matches!(
            err,
            SetupError::InvalidTransition {
                from: RunState::Idle,
                to: RunState::Completed
            }
        ));
        assert_eq!(state, RunState::Idle);
    }

    #[test]
    fn exit_codes_per_outcome() {
        assert_eq!(RunState::Completed.exit_code(), 0);
        assert_eq!(RunState::Failed.exit_code(), 1);
        assert_eq!(RunState::Cancelled.exit_code(), 130);
    }

    #[test]
    fn running_is_not_reentered() {
        let mut state = RunState::Running;
        assert!(state.advance(RunState::Running).is_err());
    }
}
