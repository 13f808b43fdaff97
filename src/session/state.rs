//! Session lifecycle state machine.

use crate::error::ShellBatchError;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, accepting commands, shell not started.
    #[default]
    Created,
    /// Shell process spawned and running the batch.
    Running,
    /// Batch completed or cancelled. Terminal.
    Finished,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Created -> Running
    /// - Created -> Finished (cancelled or failed to spawn)
    /// - Running -> Finished
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Created, Running) | (Created, Finished) | (Running, Finished)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            return Ok(());
        }
        match self {
            SessionState::Finished => Err(ShellBatchError::AlreadyFinished),
            _ => Err(ShellBatchError::AlreadyStarted),
        }
    }

    /// Check if this is the terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let mut state = SessionState::Created;
        assert!(state.transition_to(SessionState::Running).is_ok());
        assert_eq!(state, SessionState::Running);

        assert!(state.transition_to(SessionState::Finished).is_ok());
        assert_eq!(state, SessionState::Finished);
    }

    #[test]
    fn test_finish_without_running() {
        let mut state = SessionState::Created;
        assert!(state.transition_to(SessionState::Finished).is_ok());
        assert!(state.is_terminal());
    }

    #[test]
    fn test_second_run_rejected() {
        let mut state = SessionState::Running;
        let err = state.transition_to(SessionState::Running).unwrap_err();
        assert!(matches!(err, ShellBatchError::AlreadyStarted));
        assert_eq!(state, SessionState::Running);
    }

    #[test]
    fn test_invalid_from_finished() {
        let mut state = SessionState::Finished;
        let err = state.transition_to(SessionState::Running).unwrap_err();
        assert!(matches!(err, ShellBatchError::AlreadyFinished));
        assert!(state.transition_to(SessionState::Finished).is_err());
        assert!(state.transition_to(SessionState::Created).is_err());
    }

    #[test]
    fn test_default() {
        assert_eq!(SessionState::default(), SessionState::Created);
    }
}
