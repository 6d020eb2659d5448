//! Shared run state
//!
//! The command processor and the run task communicate through a
//! [`RunHandle`]. Commands validate their request against the state the
//! run will be in once earlier requests are applied and leave it pending;
//! the run loop applies it at the top of its next tick. Readings flow the
//! other way for STATUS.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kiln_core::job::JobId;
use kiln_core::state::{InvalidTransition, Request, RunState};
use kiln_core::units::Units;

/// Point-in-time view of a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub state: RunState,
    pub job_id: Option<JobId>,
    pub units: Units,
    /// Fahrenheit
    pub measured: Option<f64>,
    /// Fahrenheit
    pub setpoint: Option<f64>,
}

#[derive(Debug)]
struct RunShared {
    state: RunState,
    /// Requested state not yet applied by the loop
    pending: Option<RunState>,
    job_id: Option<JobId>,
    units: Units,
    measured: Option<f64>,
    setpoint: Option<f64>,
}

impl RunShared {
    fn projected(&self) -> RunState {
        self.pending.unwrap_or(self.state)
    }
}

/// Handle shared by the run loop and the command processor
#[derive(Debug, Clone)]
pub struct RunHandle {
    inner: Arc<Mutex<RunShared>>,
}

impl RunHandle {
    pub fn new(job_id: JobId, units: Units) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RunShared {
                state: RunState::Idle,
                pending: None,
                job_id: Some(job_id),
                units,
                measured: None,
                setpoint: None,
            })),
        }
    }

    /// State the run loop last entered
    pub fn state(&self) -> RunState {
        self.lock().state
    }

    /// Queue an operator request for the run loop
    ///
    /// Returns the state the run will enter once the loop picks it up.
    pub fn request(&self, request: Request) -> Result<RunState, InvalidTransition> {
        let mut shared = self.lock();
        let next = shared.projected().request(request)?;
        shared.pending = Some(next);
        Ok(next)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let shared = self.lock();
        RunSnapshot {
            state: shared.state,
            job_id: shared.job_id.clone(),
            units: shared.units,
            measured: shared.measured,
            setpoint: shared.setpoint,
        }
    }

    /// Apply the pending request, returning `(from, to)` if the state
    /// changed
    pub(crate) fn apply_pending(&self) -> Option<(RunState, RunState)> {
        let mut shared = self.lock();
        let next = shared.pending.take()?;
        let from = shared.state;
        shared.state = next;
        (from != next).then_some((from, next))
    }

    /// Take a pending stop at the end of the profile; any other pending
    /// request is dropped
    pub(crate) fn apply_pending_stop(&self) -> Option<(RunState, RunState)> {
        let mut shared = self.lock();
        match shared.pending.take() {
            Some(RunState::Stopped) => {
                let from = shared.state;
                shared.state = RunState::Stopped;
                Some((from, RunState::Stopped))
            }
            _ => None,
        }
    }

    /// Transition on the loop's own behalf, discarding any pending request
    pub(crate) fn enter(
        &self,
        request: Request,
    ) -> Result<(RunState, RunState), InvalidTransition> {
        let mut shared = self.lock();
        let from = shared.state;
        let to = from.request(request)?;
        shared.state = to;
        shared.pending = None;
        Ok((from, to))
    }

    /// Publish the latest reading and setpoint, Fahrenheit
    pub(crate) fn record_sample(&self, measured: f64, setpoint: f64) {
        let mut shared = self.lock();
        shared.measured = Some(measured);
        shared.setpoint = Some(setpoint);
    }

    /// Forget the job once the run is over
    pub(crate) fn clear_job(&self) {
        let mut shared = self.lock();
        shared.job_id = None;
        shared.pending = None;
    }

    fn lock(&self) -> MutexGuard<'_, RunShared> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
