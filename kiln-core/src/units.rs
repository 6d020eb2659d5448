//! Temperature units and conversions
//!
//! Profiles are held in Fahrenheit internally; jobs may be declared in
//! either Fahrenheit or Celsius. Sensors decode Celsius and convert to
//! whatever [`Scale`] the caller asks for.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Offset between Celsius and Kelvin
pub const KELVIN_OFFSET: f64 = 273.15;

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Unit system a job's segments are written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Units {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "F", alias = "f"))]
    Fahrenheit,
    #[cfg_attr(feature = "serde", serde(rename = "C", alias = "c"))]
    Celsius,
}

impl Units {
    /// Convert an absolute temperature in these units to Fahrenheit
    pub fn to_fahrenheit(self, value: f64) -> f64 {
        match self {
            Units::Fahrenheit => value,
            Units::Celsius => celsius_to_fahrenheit(value),
        }
    }

    /// Convert an absolute Fahrenheit temperature into these units
    pub fn from_fahrenheit(self, value: f64) -> f64 {
        match self {
            Units::Fahrenheit => value,
            Units::Celsius => fahrenheit_to_celsius(value),
        }
    }

    /// Convert a rate (degrees per hour) to Fahrenheit degrees per hour
    ///
    /// Rates are temperature differences, so only the scale factor applies.
    pub fn rate_to_fahrenheit(self, rate: f64) -> f64 {
        match self {
            Units::Fahrenheit => rate,
            Units::Celsius => rate * 9.0 / 5.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Units::Fahrenheit => "F",
            Units::Celsius => "C",
        }
    }
}

/// Output scale for a sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl Scale {
    /// Convert a Celsius reading into this scale
    pub fn from_celsius(self, c: f64) -> f64 {
        match self {
            Scale::Celsius => c,
            Scale::Fahrenheit => celsius_to_fahrenheit(c),
            Scale::Kelvin => c + KELVIN_OFFSET,
        }
    }
}

impl From<Units> for Scale {
    fn from(units: Units) -> Self {
        match units {
            Units::Fahrenheit => Scale::Fahrenheit,
            Units::Celsius => Scale::Celsius,
        }
    }
}
