//! In-process pins for running without hardware
//!
//! [`SimOutput`] records its level and optionally notifies an observer on
//! every change, which is how the simulated kiln learns when its element
//! is energized. [`SimInput`] reads a level some other component drives.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::gpio::{InputPin, OutputPin};

type Observer = Box<dyn FnMut(bool) + Send>;

/// Simulated output line
pub struct SimOutput {
    name: &'static str,
    level: Arc<AtomicBool>,
    observer: Option<Observer>,
}

impl SimOutput {
    /// Create a pin starting low
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            level: Arc::new(AtomicBool::new(false)),
            observer: None,
        }
    }

    /// Create a pin that calls `observer` with each new level
    pub fn with_observer<F>(name: &'static str, observer: F) -> Self
    where
        F: FnMut(bool) + Send + 'static,
    {
        Self {
            observer: Some(Box::new(observer)),
            ..Self::new(name)
        }
    }

    /// Shared view of the line level, usable as an input elsewhere
    pub fn probe(&self) -> SimInput {
        SimInput {
            level: self.level.clone(),
        }
    }

    fn drive(&mut self, high: bool) {
        let previous = self.level.swap(high, Ordering::SeqCst);
        if previous != high {
            log::trace!("sim pin {} -> {}", self.name, if high { "high" } else { "low" });
        }
        if let Some(observer) = self.observer.as_mut() {
            observer(high);
        }
    }
}

impl fmt::Debug for SimOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimOutput")
            .field("name", &self.name)
            .field("high", &self.level.load(Ordering::SeqCst))
            .finish()
    }
}

impl OutputPin for SimOutput {
    fn set_high(&mut self) {
        self.drive(true);
    }

    fn set_low(&mut self) {
        self.drive(false);
    }

    fn is_set_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

/// Simulated input line
#[derive(Debug, Clone, Default)]
pub struct SimInput {
    level: Arc<AtomicBool>,
}

impl SimInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the line from the simulated peripheral's side
    pub fn drive(&self, high: bool) {
        self.level.store(high, Ordering::SeqCst);
    }
}

impl InputPin for SimInput {
    fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_probe_follows_output() {
        let mut pin = SimOutput::new("heater");
        let probe = pin.probe();
        assert!(probe.is_low());

        pin.set_high();
        assert!(probe.is_high());
        pin.toggle();
        assert!(probe.is_low());
    }

    #[test]
    fn test_observer_sees_every_write() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut pin = SimOutput::with_observer("heater", move |high| {
            sink.lock().unwrap().push(high);
        });

        pin.set_high();
        pin.set_high();
        pin.set_low();

        assert_eq!(*seen.lock().unwrap(), vec![true, true, false]);
    }

    #[test]
    fn test_input_driven_externally() {
        let line = SimInput::new();
        let reader = line.clone();
        line.drive(true);
        assert!(reader.is_high());
    }
}
