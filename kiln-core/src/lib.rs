//! Hardware-independent core logic for the kiln controller
//!
//! This crate contains all control logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (thermocouple sensor, heater output)
//! - Temperature units and conversions
//! - Firing profile builder (segments to per-minute setpoint table)
//! - Fuzzy-logic duty-cycle controller
//! - Run lifecycle state machine
//! - Over-temperature safety check
//! - Job definitions and validation
//! - Telemetry sink for run events

#![deny(unsafe_code)]

pub mod fuzzy;
pub mod job;
pub mod profile;
pub mod safety;
pub mod state;
pub mod telemetry;
pub mod traits;
pub mod units;
