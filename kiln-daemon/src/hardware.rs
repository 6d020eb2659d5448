//! Shared hardware handles and backend construction
//!
//! The thermocouple and the heater relay outlive any single run. Both are
//! held behind a lock so the command processor and the active run can
//! reach them.
//!
//! The heater is handed to a run as a [`HeaterLease`]. The processor can
//! [`SharedHeater::reclaim`] it at any time: the element is forced off and
//! the lease is revoked, so a run that failed to stop in time can no
//! longer energize the element even if its task is still scheduled.
//!
//! Thermocouple reads are blocking bit-bang transfers, and a faulted read
//! backs off between retries. The backoff goes through [`RuntimeDelay`] so
//! it does not hold up the other tasks on a runtime worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task;

use kiln_core::traits::{HeaterOutput, SensorFault, TemperatureSensor};
use kiln_core::units::Scale;
use kiln_drivers::heater::GpioHeater;
use kiln_drivers::sensor::{Max31855, RetryPolicy};
use kiln_drivers::sim::{SimThermocouple, SimulatedKiln, ThermalParams};
use kiln_hal::sim::SimOutput;
use kiln_hal::{PinBus, StdDelay};
use kiln_hal_rpi::{PinError, RpiGpio, RpiInput, RpiOutput};

use crate::config::HardwareConfig;

/// Thermocouple on the Pi header
pub type RpiSensor = Max31855<PinBus<RpiOutput, RpiOutput, RpiInput>, RuntimeDelay>;
/// Element relay on the Pi header
pub type RpiHeater = GpioHeater<RpiOutput>;
/// Thermocouple of the simulated kiln
pub type SimSensor = Max31855<SimThermocouple, RuntimeDelay>;
/// Element relay of the simulated kiln
pub type SimHeater = GpioHeater<SimOutput>;

/// Retry backoff for reads made from inside the async runtime
///
/// On a multi-threaded runtime the sleep runs under
/// [`task::block_in_place`], which hands the worker's queued tasks to
/// another thread first. Elsewhere it is a plain thread sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeDelay(StdDelay);

impl RuntimeDelay {
    fn blocking(&mut self, wait: impl FnOnce(&mut StdDelay)) {
        let multi_thread = Handle::try_current()
            .is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread);
        if multi_thread {
            task::block_in_place(|| wait(&mut self.0));
        } else {
            wait(&mut self.0);
        }
    }
}

impl DelayNs for RuntimeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.blocking(|delay| delay.delay_ns(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.blocking(|delay| delay.delay_ms(ms));
    }
}

/// Thermocouple shared between the processor and the active run
pub struct SharedSensor<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedSensor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: TemperatureSensor> SharedSensor<S> {
    pub fn new(sensor: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sensor)),
        }
    }
}

impl<S: TemperatureSensor> TemperatureSensor for SharedSensor<S> {
    fn read(&mut self, scale: Scale) -> Result<f64, SensorFault> {
        lock(&self.inner).read(scale)
    }
}

struct HeaterSlot<H> {
    heater: H,
    /// Lease currently allowed to drive the element, if any
    owner: Option<u64>,
    next_lease: u64,
}

/// Heater relay shared between the processor and the active run
pub struct SharedHeater<H> {
    slot: Arc<Mutex<HeaterSlot<H>>>,
}

impl<H> Clone for SharedHeater<H> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<H: HeaterOutput> SharedHeater<H> {
    /// Take ownership of the relay, forcing it off
    pub fn new(mut heater: H) -> Self {
        heater.set_on(false);
        Self {
            slot: Arc::new(Mutex::new(HeaterSlot {
                heater,
                owner: None,
                next_lease: 1,
            })),
        }
    }

    /// Hand the relay to a new run, revoking any previous lease
    pub fn lease(&self) -> HeaterLease<H> {
        let mut slot = lock(&self.slot);
        slot.heater.set_on(false);
        let id = slot.next_lease;
        slot.next_lease += 1;
        slot.owner = Some(id);
        debug!("heater leased (lease {})", id);
        HeaterLease {
            slot: self.slot.clone(),
            id,
        }
    }

    /// Force the element off and revoke the current lease
    pub fn reclaim(&self) {
        let mut slot = lock(&self.slot);
        slot.heater.set_on(false);
        if let Some(id) = slot.owner.take() {
            debug!("heater reclaimed from lease {}", id);
        }
    }

    pub fn is_on(&self) -> bool {
        lock(&self.slot).heater.is_on()
    }

    /// Check whether a run currently holds the relay
    pub fn is_leased(&self) -> bool {
        lock(&self.slot).owner.is_some()
    }
}

/// A run's claim on the heater relay
///
/// Switching on through a revoked lease is ignored. Switching off always
/// goes through.
pub struct HeaterLease<H> {
    slot: Arc<Mutex<HeaterSlot<H>>>,
    id: u64,
}

impl<H> HeaterLease<H> {
    pub fn is_revoked(&self) -> bool {
        lock(&self.slot).owner != Some(self.id)
    }
}

impl<H: HeaterOutput> HeaterOutput for HeaterLease<H> {
    fn set_on(&mut self, on: bool) {
        let mut slot = lock(&self.slot);
        if on && slot.owner != Some(self.id) {
            warn!("lease {} revoked, refusing to energize heater", self.id);
            return;
        }
        slot.heater.set_on(on);
    }

    fn is_on(&self) -> bool {
        let slot = lock(&self.slot);
        slot.owner == Some(self.id) && slot.heater.is_on()
    }
}

impl<H> Drop for HeaterLease<H> {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.owner == Some(self.id) {
            slot.owner = None;
        }
    }
}

/// The sensor and relay the daemon drives
pub struct Hardware<S, H> {
    pub sensor: SharedSensor<S>,
    pub heater: SharedHeater<H>,
}

impl<S: TemperatureSensor, H: HeaterOutput> Hardware<S, H> {
    pub fn new(sensor: S, heater: H) -> Self {
        Self {
            sensor: SharedSensor::new(sensor),
            heater: SharedHeater::new(heater),
        }
    }
}

/// Claim the relay and converter lines on the Pi header
pub fn rpi_hardware(
    config: &HardwareConfig,
    policy: RetryPolicy,
) -> Result<Hardware<RpiSensor, RpiHeater>, PinError> {
    let mut gpio = RpiGpio::open()?;

    let (heater_pin, heater_spec) = gpio.output(&config.heater)?;
    let (cs, _) = gpio.output(&config.cs)?;
    let (clk, _) = gpio.output(&config.clk)?;
    let data = gpio.input(&config.data)?;

    info!(
        "hardware: heater={} cs={} clk={} data={}",
        config.heater, config.cs, config.clk, config.data
    );

    let heater = GpioHeater::new(heater_pin, heater_spec.inverted);
    let sensor = Max31855::with_policy(PinBus::new(cs, clk, data), RuntimeDelay::default(), policy);
    Ok(Hardware::new(sensor, heater))
}

/// Build a simulated kiln and the hardware wired to it
pub fn simulated_hardware(
    params: ThermalParams,
    policy: RetryPolicy,
) -> (Hardware<SimSensor, SimHeater>, SimulatedKiln) {
    let kiln = SimulatedKiln::new(params);
    info!(
        "hardware: simulated kiln (ambient {} F, {} F/s heating)",
        params.ambient_f, params.heat_rate_f_per_s
    );

    let heater = GpioHeater::new_active_high(kiln.heater_pin());
    let sensor = Max31855::with_policy(kiln.thermocouple(), RuntimeDelay::default(), policy);
    (Hardware::new(sensor, heater), kiln)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
