//! Per-minute setpoint and threshold tables
//!
//! Index 0 of the setpoint table is the measured starting temperature.
//! Each later index is the setpoint at the end of that elapsed minute,
//! and `thresholds[m]` is the ceiling in force during minute `m`, so the
//! threshold table is always exactly one entry shorter.

use super::segment::{check_length, ConfigurationError, Segment};
use crate::units::Units;

/// Setpoint and ceiling at one instant of a run, in Fahrenheit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    pub setpoint: f64,
    pub threshold: f64,
}

/// A built firing profile
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    setpoints: Vec<f64>,
    thresholds: Vec<f64>,
    final_threshold: f64,
    duration_s: f64,
}

impl Profile {
    /// Build the tables from a segment list
    ///
    /// `start_f` is the measured kiln temperature in Fahrenheit; segment
    /// values are in `units` and converted before use.
    pub fn build(
        segments: &[Segment],
        start_f: f64,
        units: Units,
    ) -> Result<Self, ConfigurationError> {
        if segments.is_empty() {
            return Err(ConfigurationError::EmptyProfile);
        }

        let mut converted = Vec::with_capacity(segments.len());
        for (index, raw) in segments.iter().enumerate() {
            raw.check_fields(index)?;
            converted.push(raw.to_fahrenheit(units));
        }

        // Size the tables before allocating them
        let mut plan = Vec::with_capacity(converted.len());
        let mut total_minutes = 0.0;
        let mut previous = start_f;
        for (index, seg) in converted.iter().enumerate() {
            let ramp = seg
                .ramp_minutes(previous)
                .ok_or(ConfigurationError::ZeroRate { segment: index })?;
            let dwell = seg.dwell.round();
            total_minutes += ramp + dwell;
            plan.push((ramp, dwell));
            previous = seg.target;
        }
        check_length(total_minutes)?;

        let minutes = total_minutes as usize;
        let mut setpoints = Vec::with_capacity(minutes + 1);
        let mut thresholds = Vec::with_capacity(minutes);
        setpoints.push(start_f);
        let mut duration_s = 0.0;
        let mut previous = start_f;

        for (seg, (ramp, dwell)) in converted.iter().zip(plan) {
            let (ramp_minutes, dwell_minutes) = (ramp as usize, dwell as usize);
            let delta = seg.target - previous;
            if seg.rate != 0.0 {
                duration_s += delta.abs() * 3600.0 / seg.rate;
            }

            for i in 1..=ramp_minutes {
                let fraction = i as f64 / ramp_minutes as f64;
                setpoints.push((previous + delta * fraction).round());
                thresholds.push(seg.threshold);
            }

            for _ in 0..dwell_minutes {
                setpoints.push(seg.target);
                thresholds.push(seg.threshold);
            }
            duration_s += seg.dwell * 60.0;

            previous = seg.target;
        }

        let final_threshold = segments
            .last()
            .map(|s| units.to_fahrenheit(s.threshold))
            .unwrap_or(f64::INFINITY);

        Ok(Self {
            setpoints,
            thresholds,
            final_threshold,
            duration_s: duration_s.round(),
        })
    }

    /// Expected run length in seconds, excluding paused time
    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// Setpoint table in Fahrenheit, one entry per minute plus the start
    pub fn setpoints(&self) -> &[f64] {
        &self.setpoints
    }

    /// Threshold table in Fahrenheit, one entry per minute
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    /// Number of whole minutes the table covers
    pub fn minutes(&self) -> usize {
        self.thresholds.len()
    }

    pub fn start_temperature(&self) -> f64 {
        self.setpoints[0]
    }

    /// Last setpoint of the profile
    pub fn final_setpoint(&self) -> f64 {
        self.setpoints[self.setpoints.len() - 1]
    }

    /// Look up the setpoint and ceiling after `elapsed_s` seconds of
    /// (unpaused) run time
    ///
    /// The setpoint is interpolated linearly within the minute. Past the
    /// end of the tables both values hold their last entry.
    pub fn at(&self, elapsed_s: f64) -> ProfilePoint {
        let minutes = (elapsed_s.max(0.0)) / 60.0;
        let minute = minutes.floor() as usize;

        let setpoint = match (self.setpoints.get(minute), self.setpoints.get(minute + 1)) {
            (Some(&from), Some(&to)) => from + (to - from) * (minutes - minute as f64),
            _ => self.final_setpoint(),
        };
        let threshold = self
            .thresholds
            .get(minute)
            .or_else(|| self.thresholds.last())
            .copied()
            .unwrap_or(self.final_threshold);

        ProfilePoint {
            setpoint,
            threshold,
        }
    }
}
