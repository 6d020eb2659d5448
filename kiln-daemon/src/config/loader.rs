//! Configuration loading
//!
//! Parses the TOML file and checks everything that can be checked before
//! the hardware is touched, so a bad pin string or a zero timeout fails at
//! startup instead of at the first START.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use thiserror::Error;

use kiln_core::job::ControlSettings;
use kiln_core::profile::ConfigurationError;
use kiln_hal_rpi::{parse_pin_string, PinError};

use super::DaemonConfig;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// TOML parsing failed
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// `[control]` defaults are not usable
    #[error("[control]: {0}")]
    Control(#[from] ConfigurationError),
    /// A pin string does not name a GPIO line
    #[error("[hardware] {name}: {source}")]
    Pin {
        name: &'static str,
        source: PinError,
    },
    /// Two functions assigned to one line
    #[error("[hardware] {first} and {second} share gpio{bcm}")]
    SharedPin {
        first: &'static str,
        second: &'static str,
        bcm: u8,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Read and validate a configuration file
pub fn load_config(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&text)?;
    info!("loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse and validate configuration text
pub fn parse_config(text: &str) -> Result<DaemonConfig, ConfigError> {
    let config: DaemonConfig = toml::from_str(text)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &DaemonConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    let timeout = Duration::try_from_secs_f64(server.stop_timeout_s);
    if timeout.map_or(true, |t| t.is_zero()) {
        return Err(ConfigError::Invalid(format!(
            "[server] stop_timeout_s {} must be a positive number of seconds",
            server.stop_timeout_s
        )));
    }
    if server.socket_mode > 0o7777 {
        return Err(ConfigError::Invalid(format!(
            "[server] socket_mode {:o} is not a permission mode",
            server.socket_mode
        )));
    }

    ControlSettings::from(config.control).validate()?;

    let tc = &config.thermocouple;
    if tc.attempts == 0 {
        return Err(ConfigError::Invalid(
            "[thermocouple] attempts must be at least 1".into(),
        ));
    }
    if tc.backoff_min_ms > tc.backoff_max_ms {
        return Err(ConfigError::Invalid(format!(
            "[thermocouple] backoff_min_ms {} exceeds backoff_max_ms {}",
            tc.backoff_min_ms, tc.backoff_max_ms
        )));
    }

    let sim = &config.simulation;
    if ![sim.ambient_f, sim.heat_rate_f_per_s, sim.loss_per_s]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(ConfigError::Invalid(
            "[simulation] values must be finite".into(),
        ));
    }

    let hw = &config.hardware;
    let pins = [
        ("heater", hw.heater.as_str()),
        ("cs", hw.cs.as_str()),
        ("clk", hw.clk.as_str()),
        ("data", hw.data.as_str()),
    ];
    let mut claimed: Vec<(&'static str, u8)> = Vec::with_capacity(pins.len());
    for (name, pin) in pins {
        let spec = parse_pin_string(pin).map_err(|source| ConfigError::Pin { name, source })?;
        if let Some(&(first, bcm)) = claimed.iter().find(|(_, bcm)| *bcm == spec.bcm) {
            return Err(ConfigError::SharedPin {
                first,
                second: name,
                bcm,
            });
        }
        claimed.push((name, spec.bcm));
    }

    Ok(())
}
