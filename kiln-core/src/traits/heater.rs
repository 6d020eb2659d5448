//! Heater and temperature sensor traits

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::units::Scale;

/// Thermocouple faults reported by the converter
///
/// Classification priority when several fault bits are set:
/// open circuit, then short to ground, then short to VCC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SensorFault {
    /// Thermocouple disconnected
    #[error("thermocouple open circuit")]
    OpenCircuit,
    /// Thermocouple shorted to ground
    #[error("thermocouple shorted to ground")]
    ShortToGround,
    /// Thermocouple shorted to VCC
    #[error("thermocouple shorted to VCC")]
    ShortToVcc,
    /// Fault flag set without a specific cause bit
    #[error("unclassified thermocouple fault")]
    Unknown,
}

/// Trait for temperature sensors
///
/// Takes `&mut self` because a read drives the bus lines.
pub trait TemperatureSensor {
    /// Read the furnace temperature in the requested scale
    fn read(&mut self, scale: Scale) -> Result<f64, SensorFault>;
}

/// Trait for heater output control
///
/// Implementations switch the element relay via GPIO or SSR.
pub trait HeaterOutput {
    /// Turn the heater on or off
    fn set_on(&mut self, on: bool);

    /// Check if the heater is currently on
    fn is_on(&self) -> bool;
}

impl<T: TemperatureSensor + ?Sized> TemperatureSensor for Box<T> {
    fn read(&mut self, scale: Scale) -> Result<f64, SensorFault> {
        (**self).read(scale)
    }
}

impl<T: HeaterOutput + ?Sized> HeaterOutput for Box<T> {
    fn set_on(&mut self, on: bool) {
        (**self).set_on(on)
    }

    fn is_on(&self) -> bool {
        (**self).is_on()
    }
}
