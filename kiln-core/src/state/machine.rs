//! State machine definition
//!
//! Heater behavior during a run is a function of the current state.
//! Unlike a display state machine that ignores stray events, every
//! request here either names a legal edge or is rejected, so callers
//! can report the refusal.

use core::fmt;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Run states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum RunState {
    /// No run started yet
    #[default]
    Idle,
    /// Following the profile
    Running,
    /// Heater held off, profile clock suspended
    Paused,
    /// Ended early by operator, safety cutoff, or sensor fault
    Stopped,
    /// Profile completed
    Finished,
}

/// Requested transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Begin the run
    Run,
    /// Suspend the run
    Pause,
    /// Continue a paused run
    Resume,
    /// End the run early
    Stop,
    /// Profile duration elapsed
    Finish,
}

/// A request that names no edge from the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {request:?} a run that is {from}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub request: Request,
}

impl RunState {
    /// Check if the heater may be energized in this state
    pub fn heater_allowed(&self) -> bool {
        matches!(self, RunState::Running)
    }

    /// Check if a run in this state still owns the heater
    pub fn is_live(&self) -> bool {
        matches!(self, RunState::Running | RunState::Paused)
    }

    /// Upper-case label used on the command channel
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "IDLE",
            RunState::Running => "RUNNING",
            RunState::Paused => "PAUSED",
            RunState::Stopped => "STOPPED",
            RunState::Finished => "FINISHED",
        }
    }

    /// Apply a request and return the next state
    ///
    /// This is the complete transition table.
    pub fn request(self, request: Request) -> Result<RunState, InvalidTransition> {
        use Request::*;
        use RunState::*;

        match (self, request) {
            (Idle, Run) => Ok(Running),

            (Running, Pause) => Ok(Paused),
            (Running, Stop) => Ok(Stopped),
            (Running, Finish) => Ok(Finished),

            (Paused, Resume) => Ok(Running),
            (Paused, Stop) => Ok(Stopped),

            (from, request) => Err(InvalidTransition { from, request }),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [RunState; 5] = [
        RunState::Idle,
        RunState::Running,
        RunState::Paused,
        RunState::Stopped,
        RunState::Finished,
    ];

    const ALL_REQUESTS: [Request; 5] = [
        Request::Run,
        Request::Pause,
        Request::Resume,
        Request::Stop,
        Request::Finish,
    ];

    #[test]
    fn test_idle_runs_once() {
        let running = RunState::Idle.request(Request::Run).unwrap();
        assert_eq!(running, RunState::Running);
        assert!(running.request(Request::Run).is_err());
    }

    #[test]
    fn test_pause_resume_flow() {
        let paused = RunState::Running.request(Request::Pause).unwrap();
        assert_eq!(paused, RunState::Paused);
        assert!(!paused.heater_allowed());

        let running = paused.request(Request::Resume).unwrap();
        assert_eq!(running, RunState::Running);
        assert!(running.heater_allowed());
    }

    #[test]
    fn test_stop_from_live_states() {
        assert_eq!(
            RunState::Running.request(Request::Stop),
            Ok(RunState::Stopped)
        );
        assert_eq!(
            RunState::Paused.request(Request::Stop),
            Ok(RunState::Stopped)
        );
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for from in [RunState::Stopped, RunState::Finished] {
            for request in ALL_REQUESTS {
                assert_eq!(
                    from.request(request),
                    Err(InvalidTransition { from, request })
                );
            }
        }
    }

    #[test]
    fn test_rejected_examples() {
        assert!(RunState::Stopped.request(Request::Resume).is_err());
        assert!(RunState::Finished.request(Request::Pause).is_err());
        assert!(RunState::Paused.request(Request::Finish).is_err());
        assert!(RunState::Running.request(Request::Resume).is_err());
        assert!(RunState::Idle.request(Request::Pause).is_err());
    }

    #[test]
    fn test_exactly_six_legal_edges() {
        let legal = ALL_STATES
            .iter()
            .flat_map(|s| ALL_REQUESTS.iter().map(move |r| s.request(*r)))
            .filter(Result::is_ok)
            .count();
        assert_eq!(legal, 6);
    }

    #[test]
    fn test_state_predicates() {
        assert!(RunState::Running.is_live());
        assert!(RunState::Paused.is_live());
        assert!(!RunState::Idle.is_live());
        assert_eq!(RunState::Paused.to_string(), "PAUSED");
    }

    #[test]
    fn test_error_message() {
        let err = RunState::Stopped.request(Request::Resume).unwrap_err();
        assert_eq!(err.to_string(), "cannot Resume a run that is STOPPED");
    }
}
