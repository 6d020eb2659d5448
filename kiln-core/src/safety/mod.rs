//! Safety monitoring
//!
//! Detects over-temperature and sensor faults and decides when a run
//! must be cut off.

pub mod monitor;

pub use monitor::{SafetyFault, SafetyMonitor, SafetyStatus};
