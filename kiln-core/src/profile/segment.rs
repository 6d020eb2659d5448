//! Firing segments and their validation

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::units::Units;

/// Longest profile accepted, in minutes (one week)
pub const MAX_PROFILE_MINUTES: f64 = 7.0 * 24.0 * 60.0;

/// One ramp/dwell step of a firing profile
///
/// `target` and `threshold` are in the job's declared units, `rate` in
/// degrees per hour, `dwell` in minutes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Segment {
    /// Temperature to ramp to
    pub target: f64,
    /// Ramp rate in degrees per hour
    pub rate: f64,
    /// Hold time at target in minutes
    pub dwell: f64,
    /// Over-temperature ceiling for the whole segment
    pub threshold: f64,
}

/// Job definitions the controller refuses to run
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("profile has no segments")]
    EmptyProfile,
    #[error("segment {segment}: {field} is not a finite number")]
    NonFinite { segment: usize, field: &'static str },
    #[error("segment {segment}: {field} must not be negative")]
    Negative { segment: usize, field: &'static str },
    /// Ramp with a zero rate would never reach its target
    #[error("segment {segment}: rate is zero but the target changes")]
    ZeroRate { segment: usize },
    /// The first segment's starting point is only known at run time
    #[error("segment 0: rate must be positive")]
    ZeroRateFirstSegment,
    /// More minute entries than [`MAX_PROFILE_MINUTES`]
    #[error("profile runs {minutes:.0} minutes, longer than one week")]
    TooLong { minutes: f64 },
    #[error("control interval {0} s is out of range")]
    InvalidInterval(f64),
    #[error("{name} {value} must be a non-negative number")]
    InvalidRange { name: &'static str, value: f64 },
}

impl Segment {
    pub fn new(target: f64, rate: f64, dwell: f64, threshold: f64) -> Self {
        Self {
            target,
            rate,
            dwell,
            threshold,
        }
    }

    /// Same segment expressed in Fahrenheit
    pub fn to_fahrenheit(&self, units: Units) -> Segment {
        Segment {
            target: units.to_fahrenheit(self.target),
            rate: units.rate_to_fahrenheit(self.rate),
            dwell: self.dwell,
            threshold: units.to_fahrenheit(self.threshold),
        }
    }

    /// Check every field is a usable number
    pub fn check_fields(&self, index: usize) -> Result<(), ConfigurationError> {
        let fields = [
            ("target", self.target),
            ("rate", self.rate),
            ("dwell", self.dwell),
            ("threshold", self.threshold),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFinite {
                    segment: index,
                    field,
                });
            }
        }
        if self.rate < 0.0 {
            return Err(ConfigurationError::Negative {
                segment: index,
                field: "rate",
            });
        }
        if self.dwell < 0.0 {
            return Err(ConfigurationError::Negative {
                segment: index,
                field: "dwell",
            });
        }
        Ok(())
    }

    /// Whole minutes spent ramping from `previous` to the target
    ///
    /// `None` when the rate is zero but the target differs. Rates and
    /// temperatures must share a unit.
    pub fn ramp_minutes(&self, previous: f64) -> Option<f64> {
        let delta = (self.target - previous).abs();
        if self.rate == 0.0 {
            return (delta == 0.0).then_some(0.0);
        }
        Some((delta / (self.rate / 60.0)).round())
    }
}

/// Validate a segment list before any temperature has been read
///
/// Later segments are checked against their predecessor's target; the
/// first segment must have a positive rate because its starting
/// temperature is not known yet. Dwells and later ramps already count
/// towards the length cap.
pub fn validate_segments(segments: &[Segment]) -> Result<(), ConfigurationError> {
    if segments.is_empty() {
        return Err(ConfigurationError::EmptyProfile);
    }
    for (index, segment) in segments.iter().enumerate() {
        segment.check_fields(index)?;
    }
    if segments[0].rate == 0.0 {
        return Err(ConfigurationError::ZeroRateFirstSegment);
    }

    // The first ramp depends on the starting temperature and is counted
    // when the profile is built
    let mut minutes: f64 = segments.iter().map(|s| s.dwell.round()).sum();
    for (index, pair) in segments.windows(2).enumerate() {
        let (previous, segment) = (&pair[0], &pair[1]);
        minutes += segment
            .ramp_minutes(previous.target)
            .ok_or(ConfigurationError::ZeroRate { segment: index + 1 })?;
    }
    check_length(minutes)
}

/// Reject profiles longer than [`MAX_PROFILE_MINUTES`]
pub fn check_length(minutes: f64) -> Result<(), ConfigurationError> {
    if minutes <= MAX_PROFILE_MINUTES {
        Ok(())
    } else {
        Err(ConfigurationError::TooLong { minutes })
    }
}
