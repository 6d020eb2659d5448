//! GPIO heater output
//!
//! Drives the element relay (or SSR) from a single GPIO line. The line can
//! be active-high or active-low; either way the heater is forced off when
//! the output is created and again when it is dropped.

use log::trace;

use kiln_core::traits::HeaterOutput;
use kiln_hal::OutputPin;

/// GPIO heater output
pub struct GpioHeater<P: OutputPin> {
    pin: P,
    /// If true, heater ON = pin LOW
    inverted: bool,
    /// Current logical state (true = heater on)
    on: bool,
}

impl<P: OutputPin> GpioHeater<P> {
    /// Create a new GPIO heater output, initially off
    ///
    /// # Arguments
    /// - `pin`: The GPIO line driving the relay
    /// - `inverted`: If true, heater is ON when the line is LOW
    pub fn new(pin: P, inverted: bool) -> Self {
        let mut heater = Self {
            pin,
            inverted,
            on: false,
        };
        heater.set_on(false);
        heater
    }

    pub fn new_active_high(pin: P) -> Self {
        Self::new(pin, false)
    }
}

impl<P: OutputPin> HeaterOutput for GpioHeater<P> {
    fn set_on(&mut self, on: bool) {
        if on != self.on {
            trace!("heater {}", if on { "on" } else { "off" });
        }
        self.on = on;
        // Normal: on -> high. Inverted: on -> low.
        self.pin.set_state(on != self.inverted);
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

impl<P: OutputPin> Drop for GpioHeater<P> {
    fn drop(&mut self) {
        self.set_on(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Mock GPIO pin whose level outlives the heater
    struct MockPin {
        high: Rc<Cell<bool>>,
    }

    impl MockPin {
        fn new(initial: bool) -> (Self, Rc<Cell<bool>>) {
            let high = Rc::new(Cell::new(initial));
            (Self { high: high.clone() }, high)
        }
    }

    impl OutputPin for MockPin {
        fn set_high(&mut self) {
            self.high.set(true);
        }

        fn set_low(&mut self) {
            self.high.set(false);
        }

        fn is_set_high(&self) -> bool {
            self.high.get()
        }
    }

    #[test]
    fn test_active_high_heater() {
        let (pin, level) = MockPin::new(true);
        let mut heater = GpioHeater::new_active_high(pin);

        // Forced off at construction
        assert!(!heater.is_on());
        assert!(!level.get());

        heater.set_on(true);
        assert!(heater.is_on());
        assert!(level.get());

        heater.set_on(false);
        assert!(!heater.is_on());
        assert!(!level.get());
    }

    #[test]
    fn test_active_low_heater() {
        let (pin, level) = MockPin::new(false);
        let mut heater = GpioHeater::new(pin, true);

        assert!(!heater.is_on());
        assert!(level.get());

        heater.set_on(true);
        assert!(!level.get());

        heater.set_on(false);
        assert!(level.get());
    }

    #[test]
    fn test_drop_forces_off() {
        let (pin, level) = MockPin::new(false);
        let mut heater = GpioHeater::new_active_high(pin);
        heater.set_on(true);
        assert!(level.get());

        drop(heater);
        assert!(!level.get());
    }

    #[test]
    fn test_heater_trait() {
        let (pin, _) = MockPin::new(false);
        let mut heater = GpioHeater::new_active_high(pin);

        fn check_heater<H: HeaterOutput>(h: &mut H) {
            assert!(!h.is_on());
            h.set_on(true);
            assert!(h.is_on());
        }

        check_heater(&mut heater);
    }
}
