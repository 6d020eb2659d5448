//! kilnd - Kiln controller daemon
//!
//! Loads the configuration, brings up the heater relay and thermocouple
//! (or a simulated kiln), and serves the command socket until interrupted.
//! On shutdown any active run is stopped and the heater is left off.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{debug, info};
use tokio::signal;
use tokio::signal::unix::SignalKind;

use kiln_core::telemetry::Telemetry;
use kiln_core::traits::{HeaterOutput, TemperatureSensor};
use kiln_daemon::config::{load_config, Backend, DaemonConfig};
use kiln_daemon::hardware::{rpi_hardware, simulated_hardware, Hardware};
use kiln_daemon::processor::{CommandProcessor, ProcessorConfig};
use kiln_daemon::tasks::{bind_socket, server_task};
use kiln_daemon::telemetry::LogTelemetry;

#[derive(Debug, Parser)]
#[command(name = "kilnd", version, about = "Fuzzy-logic kiln controller daemon")]
struct Args {
    /// Configuration file (defaults apply when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Drive the simulated kiln instead of GPIO
    #[arg(long)]
    simulate: bool,

    /// Command socket path, overriding the configuration
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => DaemonConfig::default(),
    };
    if args.simulate {
        config.hardware.backend = Backend::Simulated;
    }
    if let Some(socket) = args.socket {
        config.server.socket_path = socket;
    }

    let env = env_logger::Env::default().default_filter_or(config.logging.level.as_str());
    env_logger::Builder::from_env(env).init();
    info!("kilnd {} starting", env!("CARGO_PKG_VERSION"));

    let policy = config.thermocouple.into();
    match config.hardware.backend {
        Backend::Rpi => {
            let hardware = rpi_hardware(&config.hardware, policy).context("GPIO setup failed")?;
            serve(hardware, &config).await
        }
        Backend::Simulated => {
            let (hardware, _kiln) = simulated_hardware(config.simulation.into(), policy);
            serve(hardware, &config).await
        }
    }
}

async fn serve<S, H>(hardware: Hardware<S, H>, config: &DaemonConfig) -> anyhow::Result<()>
where
    S: TemperatureSensor + Send + 'static,
    H: HeaterOutput + Send + 'static,
{
    let telemetry: Arc<dyn Telemetry> = Arc::new(LogTelemetry);
    let processor = Arc::new(CommandProcessor::new(
        hardware,
        telemetry,
        ProcessorConfig {
            stop_timeout: config.server.stop_timeout(),
            defaults: config.control.into(),
        },
    ));

    let path = &config.server.socket_path;
    let listener = bind_socket(path, config.server.socket_mode)
        .with_context(|| format!("cannot bind {}", path.display()))?;

    let mut terminate =
        signal::unix::signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;

    let result = tokio::select! {
        result = server_task(listener, processor.clone()) => {
            result.context("command socket failed")
        }
        _ = signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
        _ = terminate.recv() => {
            info!("terminated, shutting down");
            Ok(())
        }
    };

    processor.shutdown().await;
    if let Err(e) = std::fs::remove_file(path) {
        debug!("could not remove {}: {}", path.display(), e);
    }
    result
}
