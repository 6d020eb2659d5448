//! Bit-banged synchronous serial bus
//!
//! A read-only three-wire bus: chip select (active low), clock, and a data
//! line driven by the peripheral. Each clock pulse takes the clock low,
//! samples the data line, then returns the clock high. This is the framing
//! the MAX31855 thermocouple converter expects.

use crate::gpio::{InputPin, OutputPin};

/// Synchronous bus the thermocouple reader clocks bits out of
pub trait BitBangBus {
    /// Assert chip select
    fn select(&mut self);

    /// Release chip select
    fn deselect(&mut self);

    /// Produce one clock pulse and return the sampled data bit
    fn clock_pulse(&mut self) -> bool;

    /// Read one 32-bit frame, most significant bit first
    ///
    /// Chip select is asserted for the whole transfer and always released
    /// before returning.
    fn read_u32(&mut self) -> u32 {
        self.select();
        let mut word = 0u32;
        for _ in 0..32 {
            word = (word << 1) | u32::from(self.clock_pulse());
        }
        self.deselect();
        word
    }
}

/// [`BitBangBus`] built from three GPIO pins
pub struct PinBus<CS, CLK, DATA> {
    cs: CS,
    clk: CLK,
    data: DATA,
}

impl<CS, CLK, DATA> PinBus<CS, CLK, DATA>
where
    CS: OutputPin,
    CLK: OutputPin,
    DATA: InputPin,
{
    /// Take ownership of the bus pins and park them idle
    /// (chip deselected, clock low)
    pub fn new(cs: CS, clk: CLK, data: DATA) -> Self {
        let mut bus = Self { cs, clk, data };
        bus.cs.set_high();
        bus.clk.set_low();
        bus
    }

    /// Release the pins
    pub fn into_inner(self) -> (CS, CLK, DATA) {
        (self.cs, self.clk, self.data)
    }
}

impl<CS, CLK, DATA> BitBangBus for PinBus<CS, CLK, DATA>
where
    CS: OutputPin,
    CLK: OutputPin,
    DATA: InputPin,
{
    fn select(&mut self) {
        self.cs.set_low();
    }

    fn deselect(&mut self) {
        self.cs.set_high();
    }

    fn clock_pulse(&mut self) -> bool {
        self.clk.set_low();
        let bit = self.data.is_high();
        self.clk.set_high();
        bit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Output pin whose level can be observed from the test
    struct ProbePin {
        level: Rc<Cell<bool>>,
    }

    impl OutputPin for ProbePin {
        fn set_high(&mut self) {
            self.level.set(true);
        }

        fn set_low(&mut self) {
            self.level.set(false);
        }

        fn is_set_high(&self) -> bool {
            self.level.get()
        }
    }

    /// Data line that shifts out a fixed word, one bit per sample
    struct ShiftOut {
        word: u32,
        index: Cell<u32>,
        cs: Rc<Cell<bool>>,
    }

    impl InputPin for ShiftOut {
        fn is_high(&self) -> bool {
            assert!(!self.cs.get(), "sampled while deselected");
            let i = self.index.get();
            self.index.set(i + 1);
            (self.word >> (31 - i)) & 1 == 1
        }
    }

    fn bus_for(word: u32) -> (PinBus<ProbePin, ProbePin, ShiftOut>, Rc<Cell<bool>>) {
        let cs = Rc::new(Cell::new(false));
        let clk = Rc::new(Cell::new(true));
        let bus = PinBus::new(
            ProbePin { level: cs.clone() },
            ProbePin { level: clk },
            ShiftOut {
                word,
                index: Cell::new(0),
                cs: cs.clone(),
            },
        );
        (bus, cs)
    }

    #[test]
    fn test_new_parks_bus_idle() {
        let (bus, cs) = bus_for(0);
        assert!(cs.get());
        let (_, clk, _) = bus.into_inner();
        assert!(clk.is_set_low());
    }

    #[test]
    fn test_read_u32_msb_first() {
        let (mut bus, cs) = bus_for(0x0C80_1A5F);
        assert_eq!(bus.read_u32(), 0x0C80_1A5F);
        // Deselected again after the transfer
        assert!(cs.get());
    }

    #[test]
    fn test_clock_ends_high_after_pulse() {
        let (mut bus, _) = bus_for(0x8000_0000);
        bus.select();
        assert!(bus.clock_pulse());
        bus.deselect();
        let (_, clk, _) = bus.into_inner();
        assert!(clk.is_set_high());
    }
}
