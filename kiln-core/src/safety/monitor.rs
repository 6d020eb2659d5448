//! Safety monitor implementation
//!
//! The ceiling changes every minute with the profile; the run loop feeds
//! the monitor the current ceiling and each new reading before deciding
//! whether the heater may be driven this tick.

use crate::traits::SensorFault;

/// Safety condition status
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyStatus {
    /// All conditions normal
    Ok,
    /// Safety condition violated
    Fault(SafetyFault),
}

/// Conditions that end a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyFault {
    /// Measured temperature strictly above the ceiling
    OverTemperature { measured: f64, threshold: f64 },
    /// The thermocouple could not be read
    Sensor(SensorFault),
}

/// Safety monitor for fault detection
#[derive(Debug, Clone, Default)]
pub struct SafetyMonitor {
    /// Most recent reading in Fahrenheit, or the fault that replaced it
    last_reading: Option<Result<f64, SensorFault>>,
    /// Ceiling in force, Fahrenheit
    threshold: Option<f64>,
}

impl SafetyMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest sensor result
    pub fn update_temperature(&mut self, reading: Result<f64, SensorFault>) {
        self.last_reading = Some(reading);
    }

    /// Record the ceiling for the current minute
    pub fn update_threshold(&mut self, threshold: f64) {
        self.threshold = Some(threshold);
    }

    /// Check all safety conditions
    ///
    /// A sensor fault takes precedence over the temperature comparison.
    /// Equal to the ceiling is still allowed.
    pub fn check(&self) -> SafetyStatus {
        match (self.last_reading, self.threshold) {
            (Some(Err(fault)), _) => SafetyStatus::Fault(SafetyFault::Sensor(fault)),
            (Some(Ok(measured)), Some(threshold)) if measured > threshold => {
                SafetyStatus::Fault(SafetyFault::OverTemperature {
                    measured,
                    threshold,
                })
            }
            _ => SafetyStatus::Ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_operation() {
        let mut monitor = SafetyMonitor::new();
        monitor.update_threshold(300.0);
        monitor.update_temperature(Ok(250.0));
        assert_eq!(monitor.check(), SafetyStatus::Ok);
    }

    #[test]
    fn test_over_threshold() {
        let mut monitor = SafetyMonitor::new();
        monitor.update_threshold(300.0);
        monitor.update_temperature(Ok(301.0));
        assert_eq!(
            monitor.check(),
            SafetyStatus::Fault(SafetyFault::OverTemperature {
                measured: 301.0,
                threshold: 300.0
            })
        );
    }

    #[test]
    fn test_at_threshold_is_ok() {
        let mut monitor = SafetyMonitor::new();
        monitor.update_threshold(300.0);
        monitor.update_temperature(Ok(300.0));
        assert_eq!(monitor.check(), SafetyStatus::Ok);
    }

    #[test]
    fn test_sensor_fault_wins() {
        let mut monitor = SafetyMonitor::new();
        monitor.update_threshold(300.0);
        monitor.update_temperature(Err(SensorFault::OpenCircuit));
        assert_eq!(
            monitor.check(),
            SafetyStatus::Fault(SafetyFault::Sensor(SensorFault::OpenCircuit))
        );
    }

    #[test]
    fn test_no_data_is_ok() {
        assert_eq!(SafetyMonitor::new().check(), SafetyStatus::Ok);
    }
}
