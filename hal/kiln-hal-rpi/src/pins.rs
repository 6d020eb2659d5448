//! `kiln-hal` pin traits over `rppal`
//!
//! Pins are claimed through [`RpiGpio`] by config pin string so a line can
//! only be owned once. Output pins come up at their inactive level: low
//! for active-high lines, high for inverted ones.

use log::debug;
use rppal::gpio::{self, Gpio};

use kiln_hal::{InputPin, OutputPin};

use crate::gpio::{parse_pin_string, GpioAllocator, PinError, PinSpec};

/// Output line on the Pi header
#[derive(Debug)]
pub struct RpiOutput {
    pin: gpio::OutputPin,
}

impl OutputPin for RpiOutput {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }

    fn toggle(&mut self) {
        self.pin.toggle();
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Input line on the Pi header
#[derive(Debug)]
pub struct RpiInput {
    pin: gpio::InputPin,
}

impl InputPin for RpiInput {
    fn is_high(&self) -> bool {
        self.pin.is_high()
    }
}

/// Handle to the GPIO peripheral plus the set of claimed lines
pub struct RpiGpio {
    gpio: Gpio,
    allocator: GpioAllocator,
}

impl RpiGpio {
    /// Open `/dev/gpiomem`
    pub fn open() -> Result<Self, PinError> {
        Ok(Self {
            gpio: Gpio::new()?,
            allocator: GpioAllocator::new(),
        })
    }

    /// Claim an output from a pin string, returning the resolved spec too
    /// so callers can honour the `!` inversion prefix.
    pub fn output(&mut self, pin: &str) -> Result<(RpiOutput, PinSpec), PinError> {
        let spec = parse_pin_string(pin)?;
        self.allocator.allocate(spec.bcm)?;
        let line = match self.gpio.get(spec.bcm) {
            Ok(line) => line,
            Err(e) => {
                self.allocator.release(spec.bcm);
                return Err(e.into());
            }
        };
        let out = if spec.inverted {
            line.into_output_high()
        } else {
            line.into_output_low()
        };
        debug!("claimed {} as output (bcm {})", pin, spec.bcm);
        Ok((RpiOutput { pin: out }, spec))
    }

    /// Claim an input from a pin string
    pub fn input(&mut self, pin: &str) -> Result<RpiInput, PinError> {
        let spec = parse_pin_string(pin)?;
        self.allocator.allocate(spec.bcm)?;
        let line = match self.gpio.get(spec.bcm) {
            Ok(line) => line,
            Err(e) => {
                self.allocator.release(spec.bcm);
                return Err(e.into());
            }
        };
        debug!("claimed {} as input (bcm {})", pin, spec.bcm);
        Ok(RpiInput {
            pin: line.into_input(),
        })
    }
}
