//! kilnctl - command-line client for kilnd
//!
//! Sends one command over the controller socket and prints the reply.
//! `start` takes a job file holding the START fields, e.g.
//!
//! ```json
//! {"job_id": 7, "units": "F", "interval": 5,
//!  "steps": [{"target": 1000, "rate": 300, "dwell": 10, "threshold": 1050}]}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;

use kiln_daemon::client::Client;
use kiln_protocol::{Command, Response};

#[derive(Debug, Parser)]
#[command(name = "kilnctl", version, about = "Control a running kiln daemon")]
struct Args {
    /// Controller socket
    #[arg(long, value_name = "PATH", default_value = "/tmp/kiln_controller")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Check the controller is alive
    Ping,
    /// Show the run state and latest readings
    Status,
    /// Start firing a job
    Start {
        /// JSON job file
        job: PathBuf,
    },
    /// End the active run
    Stop,
    /// Hold the heater off and suspend the profile clock
    Pause,
    /// Continue a paused run
    Resume,
}

fn start_command(job: &Path) -> anyhow::Result<Command> {
    let text = fs::read_to_string(job).with_context(|| format!("cannot read {}", job.display()))?;
    let mut record: Value =
        serde_json::from_str(&text).with_context(|| format!("{} is not JSON", job.display()))?;
    let Some(fields) = record.as_object_mut() else {
        bail!("{} must hold a JSON object", job.display());
    };
    fields.insert("command".into(), Value::from("start"));
    Ok(Command::from_line(&record.to_string())?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let command = match &args.command {
        Action::Ping => Command::Ping,
        Action::Status => Command::Status,
        Action::Start { job } => start_command(job)?,
        Action::Stop => Command::Stop,
        Action::Pause => Command::Pause,
        Action::Resume => Command::Resume,
    };

    let mut client = Client::connect(&args.socket).await?;
    let response = client.send(&command).await?;
    println!("{}", response.to_line()?);

    if let Response::Error { kind, message, .. } = response {
        bail!("{:?}: {}", kind, message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::job::JobId;
    use kiln_core::units::Units;

    #[test]
    fn test_sample_job_file() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/jobs/bisque.json"));
        let Command::Start(start) = start_command(path).unwrap() else {
            panic!("expected START");
        };
        assert_eq!(start.job_id, JobId::from("bisque-04"));
        assert_eq!(start.units, Units::Fahrenheit);
        assert_eq!(start.segments.len(), 3);
        assert_eq!(start.interval_s, Some(5.0));
    }

    #[test]
    fn test_job_file_must_be_object() {
        let path = std::env::temp_dir().join(format!("kiln-job-{}.json", std::process::id()));
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(start_command(&path).is_err());
        let _ = fs::remove_file(&path);
    }
}
