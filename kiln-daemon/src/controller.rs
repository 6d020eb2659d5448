//! Firing run loop
//!
//! A run follows the profile one control interval at a time:
//!
//! 1. Apply any operator request queued on the [`RunHandle`]
//! 2. While paused, hold the heater off and accumulate paused time
//! 3. Read the thermocouple and look up the setpoint and ceiling
//! 4. Cut the run off on a sensor fault or over-temperature
//! 5. Ask the fuzzy controller for a duty cycle
//! 6. Energize the element for `duty * interval`, then rest for the rest
//!
//! The profile clock is wall time since the start minus paused time. The
//! heater is switched off on every exit path.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;
use tokio::time::{sleep, Instant};

use kiln_core::fuzzy::FuzzyController;
use kiln_core::job::{ControlSettings, JobId, JobSpec};
use kiln_core::profile::{ConfigurationError, Profile};
use kiln_core::safety::{SafetyFault, SafetyMonitor, SafetyStatus};
use kiln_core::state::{Request, RunState};
use kiln_core::telemetry::{ErrorTracker, RunEvent, RunOutcome, Telemetry, TickSample};
use kiln_core::traits::{HeaterOutput, SensorFault, TemperatureSensor};
use kiln_core::units::Scale;

use crate::channels::RunHandle;

/// Reasons a run never got going
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum StartError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("cannot read the starting temperature: {0}")]
    Sensor(#[from] SensorFault),
}

/// One firing run
pub struct Controller<S, H> {
    job_id: JobId,
    settings: ControlSettings,
    interval: Duration,
    profile: Profile,
    sensor: S,
    heater: H,
    handle: RunHandle,
    telemetry: Arc<dyn Telemetry>,
    fuzzy: FuzzyController,
    safety: SafetyMonitor,
    tracker: ErrorTracker,
    started_at: Instant,
    /// Seconds since start, sampled after each tick
    runtime_s: f64,
    /// Seconds spent paused
    pausetime_s: f64,
    last_error: f64,
}

impl<S: TemperatureSensor, H: HeaterOutput> Controller<S, H> {
    /// Validate the job, read the kiln, build the profile and enter
    /// RUNNING
    ///
    /// Nothing is started if any step fails. The heater is left off.
    pub fn start(
        job: JobSpec,
        mut sensor: S,
        mut heater: H,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self, StartError> {
        heater.set_on(false);
        job.validate()?;
        let interval = Duration::try_from_secs_f64(job.settings.interval_s)
            .map_err(|_| ConfigurationError::InvalidInterval(job.settings.interval_s))?;

        let start_f = sensor.read(Scale::Fahrenheit)?;
        let profile = Profile::build(&job.segments, start_f, job.units)?;

        let controller = Self {
            handle: RunHandle::new(job.id.clone(), job.units),
            fuzzy: FuzzyController::new(job.settings.erange, job.settings.drange),
            job_id: job.id,
            settings: job.settings,
            interval,
            profile,
            sensor,
            heater,
            telemetry,
            safety: SafetyMonitor::new(),
            tracker: ErrorTracker::default(),
            started_at: Instant::now(),
            runtime_s: 0.0,
            pausetime_s: 0.0,
            last_error: 0.0,
        };

        controller.telemetry.record(&RunEvent::Started {
            job_id: &controller.job_id,
            start_temperature: controller.profile.start_temperature(),
            duration_s: controller.profile.duration_s(),
            minutes: controller.profile.minutes(),
        });
        controller.transition(Request::Run);
        Ok(controller)
    }

    pub fn handle(&self) -> RunHandle {
        self.handle.clone()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Follow the profile to completion or until stopped
    pub async fn run(mut self) -> RunOutcome {
        let outcome = self.execute().await;
        self.heater.set_on(false);

        // Leave the handle in the state the outcome implies
        if self.handle.state().is_live() {
            let request = match outcome.final_state() {
                RunState::Finished => Request::Finish,
                _ => Request::Stop,
            };
            self.transition(request);
        }
        self.handle.clear_job();

        self.telemetry.record(&RunEvent::Ended {
            job_id: &self.job_id,
            outcome,
            stats: self.tracker.stats(),
        });
        outcome
    }

    async fn execute(&mut self) -> RunOutcome {
        let interval = self.interval;
        let duration_s = self.profile.duration_s();

        while self.runtime_s - self.pausetime_s < duration_s {
            if let Some(change) = self.handle.apply_pending() {
                self.report_change(change);
            }

            match self.handle.state() {
                RunState::Paused => {
                    self.heater.set_on(false);
                    sleep(interval).await;
                    self.pausetime_s += self.settings.interval_s;
                    continue;
                }
                RunState::Stopped => return RunOutcome::Stopped,
                _ => {}
            }

            if let Some(outcome) = self.tick(interval).await {
                return outcome;
            }
            self.runtime_s = self.started_at.elapsed().as_secs_f64();
        }

        // A stop that raced the last tick still wins
        if let Some(change) = self.handle.apply_pending_stop() {
            self.report_change(change);
            return RunOutcome::Stopped;
        }
        RunOutcome::Finished
    }

    /// One control interval; returns an outcome if the run must end
    async fn tick(&mut self, interval: Duration) -> Option<RunOutcome> {
        let elapsed_s = (self.runtime_s - self.pausetime_s).max(0.0);
        let point = self.profile.at(elapsed_s);

        let reading = self.sensor.read(Scale::Fahrenheit);
        self.safety.update_threshold(point.threshold);
        self.safety.update_temperature(reading);

        let measured = match (self.safety.check(), reading) {
            (SafetyStatus::Fault(SafetyFault::OverTemperature { measured, threshold }), _) => {
                self.handle.record_sample(measured, point.setpoint);
                warn!(
                    "job {}: {:.1} F exceeds ceiling {:.1} F, cutting off",
                    self.job_id, measured, threshold
                );
                return Some(self.cut_off(RunOutcome::SafetyCutoff {
                    measured,
                    threshold,
                }));
            }
            (SafetyStatus::Fault(SafetyFault::Sensor(fault)), _)
            | (SafetyStatus::Ok, Err(fault)) => {
                warn!("job {}: thermocouple fault ({}), cutting off", self.job_id, fault);
                return Some(self.cut_off(RunOutcome::SensorFault(fault)));
            }
            (SafetyStatus::Ok, Ok(measured)) => measured,
        };

        let error = measured - point.setpoint;
        let delta = error - self.last_error;
        self.last_error = error;

        let duty = self.fuzzy.update(error, delta);
        let rms_error = self.tracker.record(error);
        self.handle.record_sample(measured, point.setpoint);

        self.telemetry.record(&RunEvent::Tick {
            job_id: &self.job_id,
            sample: TickSample {
                elapsed_s,
                measured,
                setpoint: point.setpoint,
                error,
                delta,
                duty,
                erange: self.fuzzy.erange(),
                drange: self.fuzzy.drange(),
                rms_error,
            },
        });

        let on = interval.mul_f64(duty);
        if !on.is_zero() && self.handle.state().heater_allowed() {
            self.heater.set_on(true);
            sleep(on).await;
        }
        self.heater.set_on(false);
        sleep(interval.saturating_sub(on)).await;
        None
    }

    fn cut_off(&mut self, outcome: RunOutcome) -> RunOutcome {
        self.heater.set_on(false);
        self.transition(Request::Stop);
        outcome
    }

    fn transition(&self, request: Request) {
        match self.handle.enter(request) {
            Ok(change) => self.report_change(change),
            Err(e) => debug!("job {}: {}", self.job_id, e),
        }
    }

    fn report_change(&self, (from, to): (RunState, RunState)) {
        self.telemetry.record(&RunEvent::StateChanged {
            job_id: &self.job_id,
            from,
            to,
        });
    }
}
