//! Job definitions
//!
//! A job is what the operator asks the kiln to fire: an identifier, the
//! segment list, the unit system the segments are written in, and the
//! controller settings for this run.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::profile::{validate_segments, ConfigurationError, Segment};
use crate::units::Units;

/// Opaque job identifier assigned by the job store
///
/// Accepted as a number or a string, carried as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(feature = "serde")]
impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Int(i64),
            Text(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Int(n) => JobId(n.to_string()),
            Repr::Text(s) => JobId(s),
        })
    }
}

/// Longest control interval accepted, in seconds
pub const MAX_INTERVAL_S: f64 = 3600.0;

/// Controller settings for one run
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlSettings {
    /// Control tick length in seconds
    pub interval_s: f64,
    /// Initial error universe half-width (Fahrenheit degrees)
    pub erange: f64,
    /// Initial delta universe half-width (Fahrenheit degrees)
    pub drange: f64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            interval_s: 5.0,
            erange: 5.0,
            drange: 5.0,
        }
    }
}

impl ControlSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(self.interval_s > 0.0 && self.interval_s <= MAX_INTERVAL_S) {
            return Err(ConfigurationError::InvalidInterval(self.interval_s));
        }
        for (name, value) in [("erange", self.erange), ("drange", self.drange)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigurationError::InvalidRange { name, value });
            }
        }
        Ok(())
    }
}

/// A complete firing job
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub id: JobId,
    pub segments: Vec<Segment>,
    pub units: Units,
    pub settings: ControlSettings,
}

impl JobSpec {
    /// Check everything that can be checked before the kiln is read
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        validate_segments(&self.segments)?;
        self.settings.validate()
    }
}
