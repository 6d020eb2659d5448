//! MAX31855 thermocouple-to-digital converter
//!
//! The converter is read by clocking a 32-bit frame out of it, most
//! significant bit first. Frame layout:
//!
//! ```text
//!  31            18 17  16  15          4  3   2   1   0
//! ┌────────────────┬───┬───┬─────────────┬───┬───┬───┬───┐
//! │ thermocouple   │ - │ F │ reference   │ - │SCV│SCG│OC │
//! │ 14b, 0.25 °C   │   │   │ 12b, 1/16 °C│   │   │   │   │
//! └────────────────┴───┴───┴─────────────┴───┴───┴───┴───┘
//! ```
//!
//! Both temperature fields are two's complement. `F` is the aggregate
//! fault flag; the low three bits say which fault.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};
use rand::Rng;

use kiln_core::traits::{SensorFault, TemperatureSensor};
use kiln_core::units::Scale;
use kiln_hal::BitBangBus;

/// Aggregate fault flag
pub const FAULT_FLAG: u32 = 1 << 16;
/// Open circuit
pub const FAULT_OC: u32 = 1 << 0;
/// Short to ground
pub const FAULT_SCG: u32 = 1 << 1;
/// Short to VCC
pub const FAULT_SCV: u32 = 1 << 2;

/// Thermocouple LSB in °C
const TC_LSB_C: f64 = 0.25;
/// Reference junction LSB in °C
const RJ_LSB_C: f64 = 0.0625;

/// One raw 32-bit frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame(pub u32);

impl Frame {
    /// Hot-junction temperature in °C
    pub fn thermocouple_c(&self) -> f64 {
        // Arithmetic shift sign-extends the 14-bit field
        f64::from((self.0 as i32) >> 18) * TC_LSB_C
    }

    /// Cold-junction temperature in °C
    pub fn reference_c(&self) -> f64 {
        f64::from(((self.0 << 16) as i32) >> 20) * RJ_LSB_C
    }

    /// Classified fault, if the fault flag is set
    pub fn fault(&self) -> Option<SensorFault> {
        if self.0 & FAULT_FLAG == 0 {
            None
        } else if self.0 & FAULT_OC != 0 {
            Some(SensorFault::OpenCircuit)
        } else if self.0 & FAULT_SCG != 0 {
            Some(SensorFault::ShortToGround)
        } else if self.0 & FAULT_SCV != 0 {
            Some(SensorFault::ShortToVcc)
        } else {
            Some(SensorFault::Unknown)
        }
    }

    /// Build the frame a converter would produce
    ///
    /// Temperatures are quantized to the converter's resolution and
    /// saturate at the field limits.
    pub fn encode(thermocouple_c: f64, reference_c: f64, fault: Option<SensorFault>) -> Frame {
        let tc = ((thermocouple_c / TC_LSB_C).round() as i32).clamp(-8192, 8191);
        let rj = ((reference_c / RJ_LSB_C).round() as i32).clamp(-2048, 2047);

        let mut raw = ((tc as u32) & 0x3FFF) << 18 | ((rj as u32) & 0x0FFF) << 4;
        if let Some(fault) = fault {
            raw |= FAULT_FLAG
                | match fault {
                    SensorFault::OpenCircuit => FAULT_OC,
                    SensorFault::ShortToGround => FAULT_SCG,
                    SensorFault::ShortToVcc => FAULT_SCV,
                    SensorFault::Unknown => 0,
                };
        }
        Frame(raw)
    }
}

/// Retry behaviour on faulted frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total reads before a fault is reported, including the first
    pub attempts: u8,
    /// Shortest wait between attempts
    pub backoff_min_ms: u32,
    /// Longest wait between attempts
    pub backoff_max_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_min_ms: 10,
            backoff_max_ms: 250,
        }
    }
}

/// Bit-banged MAX31855 reader
pub struct Max31855<B, D> {
    bus: B,
    delay: D,
    policy: RetryPolicy,
}

impl<B: BitBangBus, D: DelayNs> Max31855<B, D> {
    pub fn new(bus: B, delay: D) -> Self {
        Self::with_policy(bus, delay, RetryPolicy::default())
    }

    pub fn with_policy(bus: B, delay: D, policy: RetryPolicy) -> Self {
        Self { bus, delay, policy }
    }

    /// Clock one frame out of the converter without interpreting it
    pub fn read_raw(&mut self) -> Frame {
        Frame(self.bus.read_u32())
    }

    /// Read a fault-free frame, retrying faulted ones with a randomized
    /// backoff
    pub fn read_frame(&mut self) -> Result<Frame, SensorFault> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            let frame = self.read_raw();
            let Some(fault) = frame.fault() else {
                return Ok(frame);
            };
            if attempt >= attempts {
                warn!("thermocouple fault after {} attempts: {}", attempt, fault);
                return Err(fault);
            }
            let wait_ms = self.backoff_ms();
            debug!(
                "thermocouple fault ({}), attempt {}/{}, retrying in {} ms",
                fault, attempt, attempts, wait_ms
            );
            self.delay.delay_ms(wait_ms);
            attempt += 1;
        }
    }

    /// Cold-junction temperature in the requested scale
    pub fn read_reference(&mut self, scale: Scale) -> Result<f64, SensorFault> {
        self.read_frame()
            .map(|frame| scale.from_celsius(frame.reference_c()))
    }

    pub fn into_inner(self) -> (B, D) {
        (self.bus, self.delay)
    }

    fn backoff_ms(&self) -> u32 {
        let min = self.policy.backoff_min_ms;
        let max = self.policy.backoff_max_ms.max(min);
        rand::thread_rng().gen_range(min..=max)
    }
}

impl<B: BitBangBus, D: DelayNs> TemperatureSensor for Max31855<B, D> {
    fn read(&mut self, scale: Scale) -> Result<f64, SensorFault> {
        self.read_frame()
            .map(|frame| scale.from_celsius(frame.thermocouple_c()))
    }
}
