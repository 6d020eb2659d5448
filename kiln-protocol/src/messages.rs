//! Message types for the command channel
//!
//! Message types are divided into two categories:
//! - Client → controller: [`Command`]
//! - Controller → client: [`Response`]

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use kiln_core::job::{ControlSettings, JobId, JobSpec};
use kiln_core::profile::Segment;
use kiln_core::state::RunState;
use kiln_core::units::Units;

use crate::line::LineError;

/// Liveness reply token
pub const PONG: &str = "PONG";

/// Placeholder for a reading that does not exist yet
pub const NOT_AVAILABLE: &str = "N/A";

/// Errors decoding or encoding a record
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Line(#[from] LineError),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("missing field {0:?}")]
    MissingField(&'static str),
    #[error("unexpected reply {0:?}")]
    UnexpectedReply(String),
}

/// Command names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Ping,
    Start,
    Stop,
    Pause,
    Resume,
    Status,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Ping => "ping",
            CommandKind::Start => "start",
            CommandKind::Stop => "stop",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
            CommandKind::Status => "status",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ping" => Some(CommandKind::Ping),
            "start" => Some(CommandKind::Start),
            "stop" => Some(CommandKind::Stop),
            "pause" => Some(CommandKind::Pause),
            "resume" => Some(CommandKind::Resume),
            "status" => Some(CommandKind::Status),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of a START command
#[derive(Debug, Clone, PartialEq)]
pub struct StartRequest {
    pub job_id: JobId,
    pub segments: Vec<Segment>,
    pub units: Units,
    /// Control tick in seconds; configured default when absent
    pub interval_s: Option<f64>,
    pub erange: Option<f64>,
    pub drange: Option<f64>,
}

impl StartRequest {
    /// Complete the job, filling omitted settings from `defaults`
    pub fn into_job(self, defaults: ControlSettings) -> JobSpec {
        JobSpec {
            id: self.job_id,
            segments: self.segments,
            units: self.units,
            settings: ControlSettings {
                interval_s: self.interval_s.unwrap_or(defaults.interval_s),
                erange: self.erange.unwrap_or(defaults.erange),
                drange: self.drange.unwrap_or(defaults.drange),
            },
        }
    }
}

/// Client → controller requests
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Start(StartRequest),
    Stop,
    Pause,
    Resume,
    Status,
}

/// Wire shape shared by every request
#[derive(Debug, Serialize, Deserialize)]
struct CommandRecord {
    command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_id: Option<JobId>,
    #[serde(default, alias = "segments", skip_serializing_if = "Option::is_none")]
    steps: Option<Vec<Segment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    units: Option<Units>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    erange: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    drange: Option<f64>,
}

impl CommandRecord {
    fn bare(kind: CommandKind) -> Self {
        Self {
            command: kind.as_str().to_string(),
            job_id: None,
            steps: None,
            units: None,
            interval: None,
            erange: None,
            drange: None,
        }
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Ping => CommandKind::Ping,
            Command::Start(_) => CommandKind::Start,
            Command::Stop => CommandKind::Stop,
            Command::Pause => CommandKind::Pause,
            Command::Resume => CommandKind::Resume,
            Command::Status => CommandKind::Status,
        }
    }

    /// Decode one request record
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        let record: CommandRecord = serde_json::from_str(line)?;
        let kind = CommandKind::parse(&record.command)
            .ok_or_else(|| ProtocolError::UnknownCommand(record.command.clone()))?;

        Ok(match kind {
            CommandKind::Ping => Command::Ping,
            CommandKind::Stop => Command::Stop,
            CommandKind::Pause => Command::Pause,
            CommandKind::Resume => Command::Resume,
            CommandKind::Status => Command::Status,
            CommandKind::Start => Command::Start(StartRequest {
                job_id: record.job_id.ok_or(ProtocolError::MissingField("job_id"))?,
                segments: record.steps.ok_or(ProtocolError::MissingField("steps"))?,
                units: record.units.unwrap_or_default(),
                interval_s: record.interval,
                erange: record.erange,
                drange: record.drange,
            }),
        })
    }

    /// Encode as one request record, without the terminator
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut record = CommandRecord::bare(self.kind());
        if let Command::Start(start) = self {
            record.job_id = Some(start.job_id.clone());
            record.steps = Some(start.segments.clone());
            record.units = Some(start.units);
            record.interval = start.interval_s;
            record.erange = start.erange;
            record.drange = start.drange;
        }
        Ok(serde_json::to_string(&record)?)
    }
}

/// Error categories reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// START while a run is live
    AlreadyRunning,
    /// Job rejected before starting
    Configuration,
    /// Request not legal in the run's current state
    InvalidTransition,
    /// Thermocouple could not be read when the run was starting
    SensorFault,
    /// Record could not be decoded
    Malformed,
}

/// A temperature in a status reply, or `"N/A"` when none exists
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Reading {
    Value(f64),
    #[default]
    NotAvailable,
}

impl Reading {
    pub fn value(&self) -> Option<f64> {
        match self {
            Reading::Value(v) => Some(*v),
            Reading::NotAvailable => None,
        }
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Reading::NotAvailable, Reading::Value)
    }
}

impl Serialize for Reading {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reading::Value(v) => serializer.serialize_f64(*v),
            Reading::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Reading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(Reading::Value(v)),
            Repr::Text(s) if s == NOT_AVAILABLE => Ok(Reading::NotAvailable),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a number or {NOT_AVAILABLE:?}, got {s:?}"
            ))),
        }
    }
}

/// Snapshot of the controller for STATUS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub state: RunState,
    pub job_id: Option<JobId>,
    pub measured_temperature: Reading,
    pub setpoint: Reading,
    /// Units the two readings are expressed in
    pub units: Units,
    /// How the most recent run ended, once one has
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<String>,
}

impl StatusReport {
    /// Report for a controller with no run
    pub fn idle() -> Self {
        Self {
            state: RunState::Idle,
            job_id: None,
            measured_temperature: Reading::NotAvailable,
            setpoint: Reading::NotAvailable,
            units: Units::Fahrenheit,
            last_outcome: None,
        }
    }
}

/// Controller → client replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response", rename_all = "snake_case")]
pub enum Response {
    /// Liveness reply, sent as the bare `PONG` token
    Pong,
    Ok {
        command: CommandKind,
    },
    Error {
        #[serde(default)]
        command: Option<CommandKind>,
        kind: ErrorKind,
        message: String,
    },
    Status(StatusReport),
}

impl Response {
    pub fn error(
        command: Option<CommandKind>,
        kind: ErrorKind,
        message: impl fmt::Display,
    ) -> Self {
        Response::Error {
            command,
            kind,
            message: message.to_string(),
        }
    }

    /// Encode as one reply record, without the terminator
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        match self {
            Response::Pong => Ok(PONG.to_string()),
            other => Ok(serde_json::to_string(other)?),
        }
    }

    /// Decode one reply record
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        if line.trim() == PONG {
            return Ok(Response::Pong);
        }
        Ok(serde_json::from_str(line)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_start_from_web_layer() {
        // Steps as the job store hands them over, with extra columns
        let line = r#"{"command":"start","job_id":7,"units":"F","interval":5,
            "erange":5,"drange":5,"steps":[{"id":1,"job_id":7,"step_order":0,
            "target":200,"rate":1200,"dwell":5,"threshold":220}]}"#
            .replace('\n', "");

        let Command::Start(start) = Command::from_line(&line).unwrap() else {
            panic!("expected START");
        };
        assert_eq!(start.job_id, JobId::from(7));
        assert_eq!(start.segments, vec![Segment::new(200.0, 1200.0, 5.0, 220.0)]);
        assert_eq!(start.units, Units::Fahrenheit);
        assert_eq!(start.interval_s, Some(5.0));
    }

    #[test]
    fn test_command_is_case_insensitive() {
        assert_eq!(Command::from_line(r#"{"command":"STATUS"}"#).unwrap(), Command::Status);
        assert_eq!(Command::from_line(r#"{"command":"Pause"}"#).unwrap(), Command::Pause);
        assert_eq!(Command::from_line(r#"{"command":"ping"}"#).unwrap(), Command::Ping);
    }

    #[test]
    fn test_start_defaults_and_aliases() {
        let line = r#"{"command":"start","job_id":"glaze-2","units":"c",
            "segments":[{"target":100,"rate":50,"dwell":0,"threshold":120}]}"#
            .replace('\n', "");
        let Command::Start(start) = Command::from_line(&line).unwrap() else {
            panic!("expected START");
        };
        assert_eq!(start.job_id.as_str(), "glaze-2");
        assert_eq!(start.units, Units::Celsius);

        let job = start.into_job(ControlSettings {
            interval_s: 10.0,
            erange: 4.0,
            drange: 3.0,
        });
        assert_eq!(job.settings.interval_s, 10.0);
        assert_eq!(job.settings.drange, 3.0);
    }

    #[test]
    fn test_start_missing_fields() {
        let err = Command::from_line(r#"{"command":"start","steps":[]}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField("job_id")));

        let err = Command::from_line(r#"{"command":"start","job_id":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField("steps")));
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert!(matches!(
            Command::from_line(r#"{"command":"explode"}"#),
            Err(ProtocolError::UnknownCommand(_))
        ));
        assert!(matches!(
            Command::from_line("not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_command_encoding() {
        assert_eq!(Command::Stop.to_line().unwrap(), r#"{"command":"stop"}"#);

        let start = Command::Start(StartRequest {
            job_id: JobId::from(3),
            segments: vec![Segment::new(250.0, 3600.0, 0.0, 300.0)],
            units: Units::Fahrenheit,
            interval_s: None,
            erange: None,
            drange: None,
        });
        let line = start.to_line().unwrap();
        assert!(line.starts_with(r#"{"command":"start","job_id":"3","steps":["#));
        assert_eq!(Command::from_line(&line).unwrap(), start);
    }

    #[test]
    fn test_pong_is_bare_token() {
        assert_eq!(Response::Pong.to_line().unwrap(), "PONG");
        assert_eq!(Response::from_line("PONG").unwrap(), Response::Pong);
    }

    #[test]
    fn test_status_encoding() {
        let report = StatusReport {
            state: RunState::Running,
            job_id: Some(JobId::from(7)),
            measured_temperature: Reading::Value(181.25),
            setpoint: Reading::Value(180.0),
            units: Units::Fahrenheit,
            last_outcome: None,
        };
        let line = Response::Status(report.clone()).to_line().unwrap();
        assert_eq!(
            line,
            r#"{"response":"status","state":"RUNNING","job_id":"7","measured_temperature":181.25,"setpoint":180.0,"units":"F"}"#
        );
        assert_eq!(Response::from_line(&line).unwrap(), Response::Status(report));
    }

    #[test]
    fn test_idle_status_uses_placeholder() {
        let line = Response::Status(StatusReport::idle()).to_line().unwrap();
        assert_eq!(
            line,
            r#"{"response":"status","state":"IDLE","job_id":null,"measured_temperature":"N/A","setpoint":"N/A","units":"F"}"#
        );
    }

    #[test]
    fn test_error_encoding() {
        let response = Response::error(
            Some(CommandKind::Start),
            ErrorKind::AlreadyRunning,
            "a run is already active",
        );
        assert_eq!(
            response.to_line().unwrap(),
            r#"{"response":"error","command":"start","kind":"already_running","message":"a run is already active"}"#
        );
    }

    #[test]
    fn test_reading_rejects_other_text() {
        assert!(serde_json::from_str::<Reading>(r#""hot""#).is_err());
        assert_eq!(
            serde_json::from_str::<Reading>("12.5").unwrap(),
            Reading::Value(12.5)
        );
    }
}
