//! Simulated kiln
//!
//! A lumped thermal model behind the same interfaces as the real
//! hardware: the heater is a [`SimOutput`] pin and the thermocouple is a
//! [`BitBangBus`] that shifts out MAX31855 frames encoding the model's
//! temperature. The daemon can run against it with no GPIO at all.
//!
//! The model integrates lazily. Every heater edge and every chip select
//! advances it to the current instant with the heater state that held
//! since the previous update.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::debug;

use kiln_core::traits::SensorFault;
use kiln_core::units::{fahrenheit_to_celsius, Units};
use kiln_hal::sim::SimOutput;
use kiln_hal::BitBangBus;

use crate::sensor::Frame;

/// Thermal model parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalParams {
    /// Room temperature, Fahrenheit
    pub ambient_f: f64,
    /// Heating rate with the element on and no losses, F per second
    pub heat_rate_f_per_s: f64,
    /// Newtonian loss coefficient, fraction of (T - ambient) per second
    pub loss_per_s: f64,
    /// Converter die temperature reported as the cold junction, Celsius
    pub reference_c: f64,
}

impl Default for ThermalParams {
    fn default() -> Self {
        Self {
            ambient_f: 70.0,
            heat_rate_f_per_s: 1.5,
            loss_per_s: 0.002,
            reference_c: 25.0,
        }
    }
}

#[derive(Debug)]
struct KilnModel {
    params: ThermalParams,
    temperature_f: f64,
    heater_on: bool,
    fault: Option<SensorFault>,
    last_update: Instant,
}

impl KilnModel {
    fn advance_by(&mut self, dt_s: f64) {
        let heating = if self.heater_on {
            self.params.heat_rate_f_per_s
        } else {
            0.0
        };
        let loss = self.params.loss_per_s * (self.temperature_f - self.params.ambient_f);
        self.temperature_f += (heating - loss) * dt_s;
    }

    fn advance_to(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.advance_by(dt);
        self.last_update = now;
    }

    fn frame(&self) -> Frame {
        Frame::encode(
            fahrenheit_to_celsius(self.temperature_f),
            self.params.reference_c,
            self.fault,
        )
    }
}

/// Handle to a shared simulated kiln
#[derive(Debug, Clone)]
pub struct SimulatedKiln {
    model: Arc<Mutex<KilnModel>>,
}

impl SimulatedKiln {
    /// Kiln at ambient temperature with the element off
    pub fn new(params: ThermalParams) -> Self {
        Self {
            model: Arc::new(Mutex::new(KilnModel {
                params,
                temperature_f: params.ambient_f,
                heater_on: false,
                fault: None,
                last_update: Instant::now(),
            })),
        }
    }

    /// Output pin wired to the element relay (active-high)
    pub fn heater_pin(&self) -> SimOutput {
        let model = self.model.clone();
        SimOutput::with_observer("heater", move |on| {
            let mut model = lock(&model);
            model.advance_to(Instant::now());
            model.heater_on = on;
        })
    }

    /// Bus wired to the simulated converter
    pub fn thermocouple(&self) -> SimThermocouple {
        SimThermocouple {
            model: self.model.clone(),
            shift: 0,
        }
    }

    /// Current model temperature in the given units
    pub fn temperature(&self, units: Units) -> f64 {
        let mut model = lock(&self.model);
        model.advance_to(Instant::now());
        units.from_fahrenheit(model.temperature_f)
    }

    /// Force the model to a temperature, Fahrenheit
    pub fn set_temperature_f(&self, temperature_f: f64) {
        let mut model = lock(&self.model);
        model.last_update = Instant::now();
        model.temperature_f = temperature_f;
    }

    /// Make the converter report a fault (or clear it with `None`)
    pub fn inject_fault(&self, fault: Option<SensorFault>) {
        debug!("simulated thermocouple fault: {:?}", fault);
        lock(&self.model).fault = fault;
    }

    pub fn heater_on(&self) -> bool {
        lock(&self.model).heater_on
    }
}

/// Simulated MAX31855 on a bit-banged bus
#[derive(Debug)]
pub struct SimThermocouple {
    model: Arc<Mutex<KilnModel>>,
    shift: u32,
}

impl BitBangBus for SimThermocouple {
    fn select(&mut self) {
        let mut model = lock(&self.model);
        model.advance_to(Instant::now());
        // Conversion result is latched on the falling edge of chip select
        self.shift = model.frame().0;
    }

    fn deselect(&mut self) {}

    fn clock_pulse(&mut self) -> bool {
        let bit = self.shift & 0x8000_0000 != 0;
        self.shift <<= 1;
        bit
    }
}

fn lock(model: &Mutex<KilnModel>) -> MutexGuard<'_, KilnModel> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heater::GpioHeater;
    use crate::sensor::Max31855;
    use kiln_core::traits::{HeaterOutput, TemperatureSensor};
    use kiln_core::units::Scale;
    use kiln_hal::StdDelay;

    fn model(params: ThermalParams) -> KilnModel {
        KilnModel {
            params,
            temperature_f: params.ambient_f,
            heater_on: false,
            fault: None,
            last_update: Instant::now(),
        }
    }

    #[test]
    fn test_heating_without_losses() {
        let mut m = model(ThermalParams {
            loss_per_s: 0.0,
            ..Default::default()
        });
        m.heater_on = true;
        m.advance_by(10.0);
        assert_eq!(m.temperature_f, 85.0);
    }

    #[test]
    fn test_cooling_towards_ambient() {
        let mut m = model(ThermalParams {
            loss_per_s: 0.01,
            ..Default::default()
        });
        m.temperature_f = 170.0;
        m.advance_by(1.0);
        assert_eq!(m.temperature_f, 169.0);
        assert!(m.temperature_f > m.params.ambient_f);
    }

    #[test]
    fn test_thermocouple_reads_model() {
        let kiln = SimulatedKiln::new(ThermalParams {
            heat_rate_f_per_s: 0.0,
            loss_per_s: 0.0,
            ..Default::default()
        });
        kiln.set_temperature_f(212.0);

        let mut tc = Max31855::new(kiln.thermocouple(), StdDelay);
        assert_eq!(tc.read(Scale::Celsius), Ok(100.0));
        assert_eq!(tc.read_reference(Scale::Celsius), Ok(25.0));
    }

    #[test]
    fn test_injected_fault() {
        let kiln = SimulatedKiln::new(ThermalParams::default());
        kiln.inject_fault(Some(SensorFault::ShortToGround));

        let policy = crate::sensor::RetryPolicy {
            attempts: 2,
            backoff_min_ms: 0,
            backoff_max_ms: 0,
        };
        let mut tc = Max31855::with_policy(kiln.thermocouple(), StdDelay, policy);
        assert_eq!(tc.read(Scale::Celsius), Err(SensorFault::ShortToGround));

        kiln.inject_fault(None);
        assert!(tc.read(Scale::Celsius).is_ok());
    }

    #[test]
    fn test_heater_pin_drives_model() {
        let kiln = SimulatedKiln::new(ThermalParams::default());
        let mut heater = GpioHeater::new_active_high(kiln.heater_pin());
        assert!(!kiln.heater_on());

        heater.set_on(true);
        assert!(kiln.heater_on());

        drop(heater);
        assert!(!kiln.heater_on());
    }
}
