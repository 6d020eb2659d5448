//! GPIO pin abstractions
//!
//! The heater relay and the three thermocouple lines are plain digital
//! pins. Backends implement these traits; drivers only ever see the traits.

/// Digital output pin
pub trait OutputPin {
    /// Drive the line to logic 1
    fn set_high(&mut self);

    /// Drive the line to logic 0
    fn set_low(&mut self);

    /// Drive the line to the given level
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }

    /// Invert the current output level
    fn toggle(&mut self) {
        let high = self.is_set_high();
        self.set_state(!high);
    }

    /// Level most recently driven onto the line
    fn is_set_high(&self) -> bool;

    fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }
}

/// Digital input pin
pub trait InputPin {
    /// Sample the line; true for logic 1
    fn is_high(&self) -> bool;

    fn is_low(&self) -> bool {
        !self.is_high()
    }
}

impl<P: OutputPin + ?Sized> OutputPin for Box<P> {
    fn set_high(&mut self) {
        (**self).set_high()
    }

    fn set_low(&mut self) {
        (**self).set_low()
    }

    fn is_set_high(&self) -> bool {
        (**self).is_set_high()
    }
}

impl<P: InputPin + ?Sized> InputPin for Box<P> {
    fn is_high(&self) -> bool {
        (**self).is_high()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch {
        high: bool,
        writes: usize,
    }

    impl OutputPin for Latch {
        fn set_high(&mut self) {
            self.high = true;
            self.writes += 1;
        }

        fn set_low(&mut self) {
            self.high = false;
            self.writes += 1;
        }

        fn is_set_high(&self) -> bool {
            self.high
        }
    }

    #[test]
    fn test_default_toggle_and_set_state() {
        let mut pin = Latch {
            high: false,
            writes: 0,
        };

        pin.toggle();
        assert!(pin.is_set_high());
        pin.toggle();
        assert!(pin.is_set_low());

        pin.set_state(true);
        assert!(pin.is_set_high());
        assert_eq!(pin.writes, 3);
    }

    #[test]
    fn test_boxed_pin_forwards() {
        let mut pin: Box<dyn OutputPin> = Box::new(Latch {
            high: false,
            writes: 0,
        });
        pin.set_high();
        assert!(pin.is_set_high());
    }
}
