//! Command socket client
//!
//! Used by `kilnctl`; sends one request at a time and waits for its reply.

use std::io;
use std::path::{Path, PathBuf};

use log::trace;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use kiln_protocol::{Command, ProtocolError, Response};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot reach the controller at {path}: {source}")]
    Connect { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("controller closed the connection")]
    Closed,
}

/// Connection to a running controller
pub struct Client {
    rx: Lines<BufReader<OwnedReadHalf>>,
    tx: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| ClientError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        let (rx, tx) = stream.into_split();
        Ok(Self {
            rx: BufReader::new(rx).lines(),
            tx,
        })
    }

    /// Send a request and wait for its reply
    pub async fn send(&mut self, command: &Command) -> Result<Response, ClientError> {
        let mut line = command.to_line()?;
        trace!("TX: {}", line);
        line.push('\n');
        self.tx.write_all(line.as_bytes()).await?;

        let reply = self.rx.next_line().await?.ok_or(ClientError::Closed)?;
        trace!("RX: {}", reply);
        Ok(Response::from_line(&reply)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use kiln_core::job::JobId;
    use kiln_core::profile::Segment;
    use kiln_core::state::RunState;
    use kiln_core::telemetry::NullTelemetry;
    use kiln_core::units::Units;
    use kiln_drivers::sim::ThermalParams;
    use kiln_protocol::{CommandKind, StartRequest};

    use crate::hardware::simulated_hardware;
    use crate::processor::{CommandProcessor, ProcessorConfig};
    use crate::tasks::{bind_socket, server_task};

    #[tokio::test]
    async fn test_session_against_simulated_kiln() {
        let path = std::env::temp_dir().join(format!("kiln-client-{}.sock", std::process::id()));
        let listener = bind_socket(&path, 0o600).unwrap();

        let policy = kiln_drivers::sensor::RetryPolicy {
            attempts: 1,
            backoff_min_ms: 0,
            backoff_max_ms: 0,
        };
        let (hardware, kiln) = simulated_hardware(ThermalParams::default(), policy);
        let processor = Arc::new(CommandProcessor::new(
            hardware,
            Arc::new(NullTelemetry),
            ProcessorConfig::default(),
        ));
        tokio::spawn(server_task(listener, processor));

        let mut client = Client::connect(&path).await.unwrap();
        assert_eq!(client.send(&Command::Ping).await.unwrap(), Response::Pong);

        let start = Command::Start(StartRequest {
            job_id: JobId::from(11),
            segments: vec![Segment::new(1800.0, 600.0, 0.0, 1850.0)],
            units: Units::Fahrenheit,
            interval_s: Some(0.05),
            erange: None,
            drange: None,
        });
        assert_eq!(
            client.send(&start).await.unwrap(),
            Response::Ok {
                command: CommandKind::Start
            }
        );

        let Response::Status(report) = client.send(&Command::Status).await.unwrap() else {
            panic!("expected a status reply");
        };
        assert_eq!(report.state, RunState::Running);
        assert_eq!(report.job_id, Some(JobId::from(11)));

        assert_eq!(
            client.send(&Command::Stop).await.unwrap(),
            Response::Ok {
                command: CommandKind::Stop
            }
        );
        assert!(!kiln.heater_on());

        let Response::Status(report) = client.send(&Command::Status).await.unwrap() else {
            panic!("expected a status reply");
        };
        assert_eq!(report.state, RunState::Idle);
        assert_eq!(report.last_outcome.as_deref(), Some("stopped"));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let err = Client::connect(Path::new("/nonexistent/kiln.sock"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ClientError::Connect { .. }));
    }
}
