//! Hardware abstraction traits
//!
//! These traits define the interface between the control logic and
//! the hardware drivers.

pub mod heater;

pub use heater::{HeaterOutput, SensorFault, TemperatureSensor};
