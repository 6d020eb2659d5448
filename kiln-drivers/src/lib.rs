//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in kiln-core for the kiln's hardware:
//!
//! - Thermocouple converter (MAX31855, bit-banged)
//! - Heater relay output (GPIO, active-high or active-low)
//! - Simulated kiln (thermal model behind the same bus and pin traits)

#![deny(unsafe_code)]

pub mod heater;
pub mod sensor;
pub mod sim;
