//! Command processor
//!
//! Owns at most one active run. START spawns it, PAUSE and RESUME queue a
//! request on its [`RunHandle`] (and do nothing when no run is active),
//! STOP queues a stop and waits for the task to wind down. Whatever
//! happens, the heater is reclaimed once a run is over, including a run
//! that had to be abandoned after the stop timeout.
//!
//! Finished runs are reaped lazily on the next command; until then STATUS
//! reports the last outcome alongside IDLE.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use kiln_core::job::{ControlSettings, JobId};
use kiln_core::profile::ConfigurationError;
use kiln_core::state::{InvalidTransition, Request};
use kiln_core::telemetry::{RunOutcome, Telemetry};
use kiln_core::traits::{HeaterOutput, SensorFault, TemperatureSensor};
use kiln_protocol::{
    Command, CommandKind, ErrorKind, Reading, Response, StartRequest, StatusReport,
};

use crate::channels::RunHandle;
use crate::controller::{Controller, StartError};
use crate::hardware::{Hardware, SharedHeater, SharedSensor};

/// Command failures reported to the client
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("job {0} is already running")]
    AlreadyRunning(JobId),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("thermocouple fault: {0}")]
    Sensor(SensorFault),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl From<StartError> for CommandError {
    fn from(e: StartError) -> Self {
        match e {
            StartError::Configuration(e) => CommandError::Configuration(e),
            StartError::Sensor(fault) => CommandError::Sensor(fault),
        }
    }
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            CommandError::Configuration(_) => ErrorKind::Configuration,
            CommandError::Sensor(_) => ErrorKind::SensorFault,
            CommandError::InvalidTransition(_) => ErrorKind::InvalidTransition,
        }
    }
}

/// Processor settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessorConfig {
    /// How long STOP waits for the run task before abandoning it
    pub stop_timeout: Duration,
    /// Settings for START fields the client omits
    pub defaults: ControlSettings,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(30),
            defaults: ControlSettings::default(),
        }
    }
}

struct ActiveRun {
    job_id: JobId,
    handle: RunHandle,
    task: JoinHandle<RunOutcome>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveRun>,
    /// Label of the most recently ended run
    last_outcome: Option<String>,
}

/// Executes decoded commands against the hardware
pub struct CommandProcessor<S, H> {
    sensor: SharedSensor<S>,
    heater: SharedHeater<H>,
    telemetry: Arc<dyn Telemetry>,
    config: ProcessorConfig,
    slot: Mutex<Slot>,
}

impl<S, H> CommandProcessor<S, H>
where
    S: TemperatureSensor + Send + 'static,
    H: HeaterOutput + Send + 'static,
{
    pub fn new(
        hardware: Hardware<S, H>,
        telemetry: Arc<dyn Telemetry>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            sensor: hardware.sensor,
            heater: hardware.heater,
            telemetry,
            config,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Execute one command and build its reply
    pub async fn handle(&self, command: Command) -> Response {
        let kind = command.kind();
        let result = match command {
            Command::Ping => return Response::Pong,
            Command::Status => return Response::Status(self.status().await),
            Command::Start(request) => self.start(request).await,
            Command::Stop => self.stop().await,
            Command::Pause => self.request(Request::Pause).await,
            Command::Resume => self.request(Request::Resume).await,
        };

        match result {
            Ok(()) => Response::Ok { command: kind },
            Err(e) => {
                warn!("{} rejected: {}", kind, e);
                Response::error(Some(kind), e.kind(), &e)
            }
        }
    }

    /// Validate a job and launch it
    pub async fn start(&self, request: StartRequest) -> Result<(), CommandError> {
        let mut slot = self.slot.lock().await;
        self.reap(&mut slot).await;
        if let Some(run) = &slot.active {
            return Err(CommandError::AlreadyRunning(run.job_id.clone()));
        }

        let job = request.into_job(self.config.defaults);
        let job_id = job.id.clone();
        let lease = self.heater.lease();
        let sensor = self.sensor.clone();
        let controller = match Controller::start(job, sensor, lease, self.telemetry.clone()) {
            Ok(controller) => controller,
            Err(e) => {
                self.heater.reclaim();
                return Err(e.into());
            }
        };

        info!("job {}: launched", job_id);
        slot.active = Some(ActiveRun {
            job_id,
            handle: controller.handle(),
            task: tokio::spawn(controller.run()),
        });
        Ok(())
    }

    /// End the active run, waiting up to the stop timeout for it
    ///
    /// Succeeds with no run active. The heater is off when this returns.
    pub async fn stop(&self) -> Result<(), CommandError> {
        let mut slot = self.slot.lock().await;
        self.reap(&mut slot).await;

        let Some(mut run) = slot.active.take() else {
            debug!("stop with no active run");
            self.heater.reclaim();
            return Ok(());
        };

        if let Err(e) = run.handle.request(Request::Stop) {
            debug!("job {}: {}", run.job_id, e);
        }

        match timeout(self.config.stop_timeout, &mut run.task).await {
            Ok(result) => {
                slot.last_outcome = Some(outcome_label(&run.job_id, result));
            }
            Err(_) => {
                warn!(
                    "job {}: run did not stop within {:?}, abandoning it",
                    run.job_id, self.config.stop_timeout
                );
                run.task.abort();
                run.handle.clear_job();
                slot.last_outcome = Some(RunOutcome::Stopped.label().to_string());
            }
        }
        self.heater.reclaim();
        Ok(())
    }

    /// Report the active run, or IDLE
    pub async fn status(&self) -> StatusReport {
        let mut slot = self.slot.lock().await;
        self.reap(&mut slot).await;

        let Some(run) = &slot.active else {
            return StatusReport {
                last_outcome: slot.last_outcome.clone(),
                ..StatusReport::idle()
            };
        };

        let snapshot = run.handle.snapshot();
        let units = snapshot.units;
        let in_units = |t: Option<f64>| Reading::from(t.map(|t| units.from_fahrenheit(t)));
        StatusReport {
            state: snapshot.state,
            job_id: snapshot.job_id,
            measured_temperature: in_units(snapshot.measured),
            setpoint: in_units(snapshot.setpoint),
            units,
            last_outcome: slot.last_outcome.clone(),
        }
    }

    /// Stop whatever is running, for process shutdown
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop().await {
            error!("shutdown: {}", e);
        }
    }

    async fn request(&self, request: Request) -> Result<(), CommandError> {
        let mut slot = self.slot.lock().await;
        self.reap(&mut slot).await;

        match &slot.active {
            Some(run) => {
                let next = run.handle.request(request)?;
                debug!("job {}: {:?} queued, heading to {}", run.job_id, request, next);
                Ok(())
            }
            None => {
                debug!("{:?} with no active run", request);
                Ok(())
            }
        }
    }

    /// Collect a run whose task has ended on its own
    async fn reap(&self, slot: &mut Slot) {
        let finished = slot
            .active
            .as_ref()
            .is_some_and(|run| run.task.is_finished());
        if !finished {
            return;
        }
        if let Some(run) = slot.active.take() {
            let result = run.task.await;
            slot.last_outcome = Some(outcome_label(&run.job_id, result));
            self.heater.reclaim();
        }
    }
}

fn outcome_label(job_id: &JobId, result: Result<RunOutcome, tokio::task::JoinError>) -> String {
    match result {
        Ok(outcome) => outcome.label().to_string(),
        Err(e) => {
            error!("job {}: run task failed: {}", job_id, e);
            "aborted".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use kiln_core::profile::Segment;
    use kiln_core::state::RunState;
    use kiln_core::telemetry::NullTelemetry;
    use kiln_core::units::{Scale, Units};

    /// Sensor shared with the test so the reading can be changed mid-run
    #[derive(Clone)]
    struct ScriptSensor {
        reading: Arc<std::sync::Mutex<Result<f64, SensorFault>>>,
    }

    impl ScriptSensor {
        fn new(temperature_f: f64) -> Self {
            Self {
                reading: Arc::new(std::sync::Mutex::new(Ok(temperature_f))),
            }
        }

        fn set(&self, reading: Result<f64, SensorFault>) {
            *self.reading.lock().unwrap() = reading;
        }
    }

    impl TemperatureSensor for ScriptSensor {
        fn read(&mut self, scale: Scale) -> Result<f64, SensorFault> {
            assert_eq!(scale, Scale::Fahrenheit);
            *self.reading.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct SwitchHeater {
        on: Arc<AtomicBool>,
    }

    impl HeaterOutput for SwitchHeater {
        fn set_on(&mut self, on: bool) {
            self.on.store(on, Ordering::SeqCst);
        }

        fn is_on(&self) -> bool {
            self.on.load(Ordering::SeqCst)
        }
    }

    type TestProcessor = CommandProcessor<ScriptSensor, SwitchHeater>;

    fn processor_with(config: ProcessorConfig) -> (TestProcessor, ScriptSensor, SwitchHeater) {
        let sensor = ScriptSensor::new(70.0);
        let heater = SwitchHeater::default();
        let processor = CommandProcessor::new(
            Hardware::new(sensor.clone(), heater.clone()),
            Arc::new(NullTelemetry),
            config,
        );
        (processor, sensor, heater)
    }

    fn processor() -> (TestProcessor, ScriptSensor, SwitchHeater) {
        processor_with(ProcessorConfig::default())
    }

    fn start_request(job_id: u64) -> StartRequest {
        StartRequest {
            job_id: JobId::from(job_id),
            segments: vec![Segment::new(1000.0, 300.0, 10.0, 1050.0)],
            units: Units::Fahrenheit,
            interval_s: None,
            erange: None,
            drange: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping() {
        let (processor, _, _) = processor();
        assert_eq!(processor.handle(Command::Ping).await, Response::Pong);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_status() {
        let (processor, _, _) = processor();
        assert_eq!(processor.status().await, StatusReport::idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_then_status() {
        let (processor, sensor, heater) = processor();
        let reply = processor.handle(Command::Start(start_request(7))).await;
        assert_eq!(reply, Response::Ok { command: CommandKind::Start });

        // Kiln falls well below the start of the ramp: full duty
        sensor.set(Ok(60.0));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = processor.status().await;
        assert_eq!(status.state, RunState::Running);
        assert_eq!(status.job_id, Some(JobId::from(7)));
        assert_eq!(status.measured_temperature, Reading::Value(60.0));
        assert_eq!(status.setpoint, Reading::Value(70.0));
        assert!(heater.is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_in_job_units() {
        let (processor, sensor, _) = processor();
        sensor.set(Ok(212.0));
        let request = StartRequest {
            units: Units::Celsius,
            segments: vec![Segment::new(500.0, 150.0, 0.0, 520.0)],
            ..start_request(9)
        };
        processor.start(request).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = processor.status().await;
        assert_eq!(status.units, Units::Celsius);
        assert_eq!(status.measured_temperature, Reading::Value(100.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected() {
        let (processor, _, _) = processor();
        processor.start(start_request(1)).await.unwrap();

        let reply = processor.handle(Command::Start(start_request(2))).await;
        let Response::Error { command, kind, .. } = reply else {
            panic!("expected an error reply");
        };
        assert_eq!(command, Some(CommandKind::Start));
        assert_eq!(kind, ErrorKind::AlreadyRunning);

        // The first run carries on
        let status = processor.status().await;
        assert_eq!(status.job_id, Some(JobId::from(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_bad_job() {
        let (processor, _, heater) = processor();
        let request = StartRequest {
            segments: vec![],
            ..start_request(1)
        };
        assert_eq!(
            processor.start(request).await,
            Err(CommandError::Configuration(ConfigurationError::EmptyProfile))
        );
        assert!(!heater.is_on());
        assert_eq!(processor.status().await.state, RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_faulted_sensor() {
        let (processor, sensor, _) = processor();
        sensor.set(Err(SensorFault::OpenCircuit));

        let reply = processor.handle(Command::Start(start_request(1))).await;
        assert!(matches!(
            reply,
            Response::Error {
                kind: ErrorKind::SensorFault,
                ..
            }
        ));
        assert_eq!(processor.status().await.state, RunState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_forces_heater_off() {
        let (processor, sensor, heater) = processor();
        processor.start(start_request(3)).await.unwrap();
        sensor.set(Ok(60.0));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(heater.is_on());

        let reply = processor.handle(Command::Stop).await;
        assert_eq!(reply, Response::Ok { command: CommandKind::Stop });
        assert!(!heater.is_on());

        let status = processor.status().await;
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.last_outcome.as_deref(), Some("stopped"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_timeout_abandons_run() {
        let (processor, sensor, heater) = processor_with(ProcessorConfig {
            stop_timeout: Duration::from_secs(1),
            ..ProcessorConfig::default()
        });

        // A ten minute interval keeps the run inside one tick long after
        // the stop timeout has expired
        let request = StartRequest {
            interval_s: Some(600.0),
            ..start_request(8)
        };
        processor.start(request).await.unwrap();
        sensor.set(Ok(60.0));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(heater.is_on());
        assert!(processor.heater.is_leased());

        let stopped_at = tokio::time::Instant::now();
        let reply = processor.handle(Command::Stop).await;
        assert_eq!(reply, Response::Ok { command: CommandKind::Stop });
        assert!(stopped_at.elapsed() < Duration::from_secs(5));
        assert!(!heater.is_on());
        assert!(!processor.heater.is_leased());

        let status = processor.status().await;
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.job_id, None);
        assert_eq!(status.last_outcome.as_deref(), Some("stopped"));

        // The abandoned run cannot energize the element again
        tokio::time::sleep(Duration::from_secs(700)).await;
        assert!(!heater.is_on());

        sensor.set(Ok(70.0));
        assert_eq!(processor.start(start_request(9)).await, Ok(()));
        assert!(processor.heater.is_leased());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_when_idle_is_ok() {
        let (processor, _, heater) = processor();
        assert_eq!(processor.stop().await, Ok(()));
        assert!(!heater.is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_transitions() {
        let (processor, _, heater) = processor();

        // Nothing to pause yet: acknowledged, nothing happens
        assert_eq!(
            processor.handle(Command::Pause).await,
            Response::Ok { command: CommandKind::Pause }
        );
        assert_eq!(processor.status().await.state, RunState::Idle);

        processor.start(start_request(4)).await.unwrap();
        assert!(matches!(
            processor.handle(Command::Resume).await,
            Response::Error {
                kind: ErrorKind::InvalidTransition,
                ..
            }
        ));

        assert_eq!(
            processor.handle(Command::Pause).await,
            Response::Ok { command: CommandKind::Pause }
        );
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(processor.status().await.state, RunState::Paused);
        assert!(!heater.is_on());

        assert_eq!(
            processor.handle(Command::Resume).await,
            Response::Ok { command: CommandKind::Resume }
        );
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(processor.status().await.state, RunState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_cutoff_is_reaped() {
        let (processor, sensor, heater) = processor();
        processor.start(start_request(5)).await.unwrap();

        sensor.set(Ok(1100.0));
        tokio::time::sleep(Duration::from_secs(30)).await;

        let status = processor.status().await;
        assert_eq!(status.state, RunState::Idle);
        assert_eq!(status.last_outcome.as_deref(), Some("safety_cutoff"));
        assert!(!heater.is_on());

        // The controller is free for the next job
        sensor.set(Ok(70.0));
        assert_eq!(processor.start(start_request(6)).await, Ok(()));
    }
}
