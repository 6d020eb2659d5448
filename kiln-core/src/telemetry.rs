//! Run telemetry sink
//!
//! The run loop reports what it does through an injected [`Telemetry`]
//! implementation instead of writing to a logger directly, so the
//! process decides where run events go (log facade, a test recorder,
//! or nowhere).

use crate::job::JobId;
use crate::state::RunState;
use crate::traits::SensorFault;

/// One control tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSample {
    /// Seconds of profile time (runtime minus paused time)
    pub elapsed_s: f64,
    /// Measured temperature, Fahrenheit
    pub measured: f64,
    /// Setpoint, Fahrenheit
    pub setpoint: f64,
    pub error: f64,
    pub delta: f64,
    pub duty: f64,
    pub erange: f64,
    pub drange: f64,
    /// Running RMS tracking error over the run so far
    pub rms_error: f64,
}

/// Summary statistics for a run
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunStats {
    /// Control ticks evaluated (paused intervals excluded)
    pub ticks: u64,
    /// RMS of (measured - setpoint) over those ticks
    pub rms_error: f64,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    /// Profile completed
    Finished,
    /// Operator stop
    Stopped,
    /// Measured temperature exceeded the ceiling
    SafetyCutoff { measured: f64, threshold: f64 },
    /// Thermocouple fault after retries
    SensorFault(SensorFault),
}

impl RunOutcome {
    /// Short machine-readable label
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Finished => "finished",
            RunOutcome::Stopped => "stopped",
            RunOutcome::SafetyCutoff { .. } => "safety_cutoff",
            RunOutcome::SensorFault(_) => "sensor_fault",
        }
    }

    /// State the run is left in
    pub fn final_state(&self) -> RunState {
        match self {
            RunOutcome::Finished => RunState::Finished,
            _ => RunState::Stopped,
        }
    }
}

/// Events reported by a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent<'a> {
    Started {
        job_id: &'a JobId,
        start_temperature: f64,
        duration_s: f64,
        minutes: usize,
    },
    StateChanged {
        job_id: &'a JobId,
        from: RunState,
        to: RunState,
    },
    Tick {
        job_id: &'a JobId,
        sample: TickSample,
    },
    Ended {
        job_id: &'a JobId,
        outcome: RunOutcome,
        stats: RunStats,
    },
}

/// Destination for run events
pub trait Telemetry: Send + Sync {
    fn record(&self, event: &RunEvent<'_>);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn record(&self, _event: &RunEvent<'_>) {}
}

/// Accumulates squared tracking error
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTracker {
    ticks: u64,
    sum_of_squares: f64,
}

impl ErrorTracker {
    /// Add one tick's error and return the running RMS
    pub fn record(&mut self, error: f64) -> f64 {
        self.ticks += 1;
        self.sum_of_squares += error * error;
        self.rms()
    }

    pub fn rms(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            (self.sum_of_squares / self.ticks as f64).sqrt()
        }
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            ticks: self.ticks,
            rms_error: self.rms(),
        }
    }
}
