//! Run events to the log facade
//!
//! Everything goes to the `kiln::run` target so a deployment can raise
//! the verbosity of run traces alone, e.g. `RUST_LOG=info,kiln::run=debug`
//! to see every control tick.

use log::{debug, error, info, warn};

use kiln_core::telemetry::{RunEvent, RunOutcome, Telemetry};

const TARGET: &str = "kiln::run";

/// Writes run events through `log`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn record(&self, event: &RunEvent<'_>) {
        match event {
            RunEvent::Started {
                job_id,
                start_temperature,
                duration_s,
                minutes,
            } => info!(
                target: TARGET,
                "job {}: starting at {:.1} F, {} profile minutes, {:.0} s",
                job_id, start_temperature, minutes, duration_s
            ),
            RunEvent::StateChanged { job_id, from, to } => {
                info!(target: TARGET, "job {}: {} -> {}", job_id, from, to)
            }
            RunEvent::Tick { job_id, sample } => debug!(
                target: TARGET,
                "job {}: t={:.0}s temp={:.2} set={:.2} err={:.2} delta={:.2} duty={:.3} \
                 erange={:.2} drange={:.2} rms={:.2}",
                job_id,
                sample.elapsed_s,
                sample.measured,
                sample.setpoint,
                sample.error,
                sample.delta,
                sample.duty,
                sample.erange,
                sample.drange,
                sample.rms_error
            ),
            RunEvent::Ended {
                job_id,
                outcome,
                stats,
            } => match outcome {
                RunOutcome::Finished => info!(
                    target: TARGET,
                    "job {}: finished after {} ticks, rms error {:.2} F",
                    job_id, stats.ticks, stats.rms_error
                ),
                RunOutcome::Stopped => info!(
                    target: TARGET,
                    "job {}: stopped after {} ticks, rms error {:.2} F",
                    job_id, stats.ticks, stats.rms_error
                ),
                RunOutcome::SafetyCutoff {
                    measured,
                    threshold,
                } => error!(
                    target: TARGET,
                    "job {}: SAFETY CUTOFF at {:.1} F (ceiling {:.1} F)",
                    job_id, measured, threshold
                ),
                RunOutcome::SensorFault(fault) => warn!(
                    target: TARGET,
                    "job {}: aborted on thermocouple fault: {}",
                    job_id, fault
                ),
            },
        }
    }
}
