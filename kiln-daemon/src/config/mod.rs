//! Daemon configuration
//!
//! Read from a TOML file at startup. Every field has a default, so an
//! empty file (or no file at all) yields a working simulated setup once
//! `backend = "simulated"` is chosen.

pub mod loader;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use kiln_core::job::ControlSettings;
use kiln_drivers::sensor::RetryPolicy;
use kiln_drivers::sim::ThermalParams;

pub use loader::{load_config, parse_config, ConfigError};

/// Complete daemon configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub control: ControlConfig,
    pub hardware: HardwareConfig,
    pub thermocouple: ThermocoupleConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

/// Command socket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub socket_path: PathBuf,
    /// Permission bits applied to the socket file
    pub socket_mode: u32,
    /// How long STOP waits for the run to wind down before abandoning it
    pub stop_timeout_s: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/kiln_controller"),
            socket_mode: 0o777,
            stop_timeout_s: 30.0,
        }
    }
}

impl ServerConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.stop_timeout_s)
    }
}

/// Defaults for START fields the client leaves out
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    pub interval_s: f64,
    pub erange: f64,
    pub drange: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        let defaults = ControlSettings::default();
        Self {
            interval_s: defaults.interval_s,
            erange: defaults.erange,
            drange: defaults.drange,
        }
    }
}

impl From<ControlConfig> for ControlSettings {
    fn from(config: ControlConfig) -> Self {
        ControlSettings {
            interval_s: config.interval_s,
            erange: config.erange,
            drange: config.drange,
        }
    }
}

/// Which hardware the daemon drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// GPIO on a Raspberry Pi header
    #[default]
    Rpi,
    /// In-process thermal model
    Simulated,
}

/// Pin assignments
///
/// Pin strings are `gpioN` (BCM numbering) or `boardN` (physical header
/// pin), with a leading `!` for an active-low line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareConfig {
    pub backend: Backend,
    /// Element relay
    pub heater: String,
    /// Converter chip select
    pub cs: String,
    /// Converter clock
    pub clk: String,
    /// Converter data out
    pub data: String,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Rpi,
            heater: "board31".into(),
            cs: "board36".into(),
            clk: "board40".into(),
            data: "board38".into(),
        }
    }
}

/// Converter read retries
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermocoupleConfig {
    pub attempts: u8,
    pub backoff_min_ms: u32,
    pub backoff_max_ms: u32,
}

impl Default for ThermocoupleConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            backoff_min_ms: policy.backoff_min_ms,
            backoff_max_ms: policy.backoff_max_ms,
        }
    }
}

impl From<ThermocoupleConfig> for RetryPolicy {
    fn from(config: ThermocoupleConfig) -> Self {
        RetryPolicy {
            attempts: config.attempts,
            backoff_min_ms: config.backoff_min_ms,
            backoff_max_ms: config.backoff_max_ms,
        }
    }
}

/// Thermal model for the simulated backend
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub ambient_f: f64,
    pub heat_rate_f_per_s: f64,
    pub loss_per_s: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let params = ThermalParams::default();
        Self {
            ambient_f: params.ambient_f,
            heat_rate_f_per_s: params.heat_rate_f_per_s,
            loss_per_s: params.loss_per_s,
        }
    }
}

impl From<SimulationConfig> for ThermalParams {
    fn from(config: SimulationConfig) -> Self {
        ThermalParams {
            ambient_f: config.ambient_f,
            heat_rate_f_per_s: config.heat_rate_f_per_s,
            loss_per_s: config.loss_per_s,
            ..ThermalParams::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}
