//! GPIO allocation and pin strings
//!
//! Tracks which BCM lines are in use to prevent conflicts, and parses the
//! pin strings used in `kiln.toml`.

use heapless::FnvIndexSet;
use thiserror::Error;

/// Number of BCM GPIO lines on the 40-pin header
pub const GPIO_COUNT: u8 = 28;

/// Physical header pin -> BCM line, `None` for power and ground pins
const BOARD_TO_BCM: [Option<u8>; 41] = [
    None,     // 0 (unused)
    None,     // 1  3V3
    None,     // 2  5V
    Some(2),  // 3
    None,     // 4  5V
    Some(3),  // 5
    None,     // 6  GND
    Some(4),  // 7
    Some(14), // 8
    None,     // 9  GND
    Some(15), // 10
    Some(17), // 11
    Some(18), // 12
    Some(27), // 13
    None,     // 14 GND
    Some(22), // 15
    Some(23), // 16
    None,     // 17 3V3
    Some(24), // 18
    Some(10), // 19
    None,     // 20 GND
    Some(9),  // 21
    Some(25), // 22
    Some(11), // 23
    Some(8),  // 24
    None,     // 25 GND
    Some(7),  // 26
    Some(0),  // 27
    Some(1),  // 28
    Some(5),  // 29
    None,     // 30 GND
    Some(6),  // 31
    Some(12), // 32
    Some(13), // 33
    None,     // 34 GND
    Some(19), // 35
    Some(16), // 36
    Some(26), // 37
    Some(20), // 38
    None,     // 39 GND
    Some(21), // 40
];

/// Pin configuration errors
#[derive(Debug, Error)]
pub enum PinError {
    /// String is not `gpioN` / `boardN` with optional `!` prefix
    #[error("invalid pin string {0:?}")]
    Syntax(String),
    /// Header pin is power or ground
    #[error("header pin {0} is not a GPIO line")]
    NotGpio(u8),
    /// Line number outside the header
    #[error("pin {0} is out of range")]
    OutOfRange(u8),
    /// Line already claimed by another function
    #[error("gpio{0} is already in use")]
    AlreadyTaken(u8),
    /// The GPIO peripheral could not be opened or the line claimed
    #[error("gpio access failed: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

/// A resolved pin assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSpec {
    /// BCM line number
    pub bcm: u8,
    /// Active-low: logical "on" drives the line low
    pub inverted: bool,
}

/// Map a physical header pin to its BCM line
pub fn board_to_bcm(board: u8) -> Result<u8, PinError> {
    BOARD_TO_BCM
        .get(usize::from(board))
        .ok_or(PinError::OutOfRange(board))?
        .ok_or(PinError::NotGpio(board))
}

/// Parse a pin string from config
///
/// Supports formats:
/// - "gpio21" -> BCM 21
/// - "board40" -> header pin 40 (BCM 21)
/// - "!board31" -> header pin 31 (BCM 6), inverted/active-low
pub fn parse_pin_string(s: &str) -> Result<PinSpec, PinError> {
    let trimmed = s.trim();
    let (rest, inverted) = match trimmed.strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let syntax = || PinError::Syntax(s.to_string());
    let bcm = if let Some(num) = rest.strip_prefix("gpio") {
        let line: u8 = num.parse().map_err(|_| syntax())?;
        if line >= GPIO_COUNT {
            return Err(PinError::OutOfRange(line));
        }
        line
    } else if let Some(num) = rest.strip_prefix("board") {
        board_to_bcm(num.parse().map_err(|_| syntax())?)?
    } else {
        return Err(syntax());
    };

    Ok(PinSpec { bcm, inverted })
}

/// GPIO allocator to track line usage
#[derive(Debug, Default)]
pub struct GpioAllocator {
    allocated: FnvIndexSet<u8, 32>,
}

impl GpioAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a line, failing if it is out of range or already claimed
    pub fn allocate(&mut self, bcm: u8) -> Result<(), PinError> {
        if bcm >= GPIO_COUNT {
            return Err(PinError::OutOfRange(bcm));
        }
        match self.allocated.insert(bcm) {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(PinError::AlreadyTaken(bcm)),
        }
    }

    pub fn release(&mut self, bcm: u8) {
        self.allocated.remove(&bcm);
    }

    pub fn is_allocated(&self, bcm: u8) -> bool {
        self.allocated.contains(&bcm)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator() {
        let mut alloc = GpioAllocator::new();

        assert!(alloc.allocate(21).is_ok());
        assert!(alloc.is_allocated(21));
        assert!(matches!(alloc.allocate(21), Err(PinError::AlreadyTaken(21))));

        assert!(alloc.allocate(16).is_ok());
        assert_eq!(alloc.allocated_count(), 2);

        alloc.release(21);
        assert!(!alloc.is_allocated(21));
        assert!(alloc.allocate(21).is_ok());

        assert!(matches!(alloc.allocate(28), Err(PinError::OutOfRange(28))));
    }

    #[test]
    fn test_default_kiln_wiring() {
        // Heater relay and MAX31855 lines on the stock controller board
        assert_eq!(
            parse_pin_string("board31").unwrap(),
            PinSpec { bcm: 6, inverted: false }
        );
        assert_eq!(parse_pin_string("board36").unwrap().bcm, 16);
        assert_eq!(parse_pin_string("board38").unwrap().bcm, 20);
        assert_eq!(parse_pin_string("board40").unwrap().bcm, 21);
    }

    #[test]
    fn test_parse_pin_string() {
        assert_eq!(
            parse_pin_string("gpio21").unwrap(),
            PinSpec { bcm: 21, inverted: false }
        );
        assert_eq!(
            parse_pin_string(" !gpio6 ").unwrap(),
            PinSpec { bcm: 6, inverted: true }
        );
        assert_eq!(
            parse_pin_string("!board31").unwrap(),
            PinSpec { bcm: 6, inverted: true }
        );

        assert!(matches!(parse_pin_string("gpio28"), Err(PinError::OutOfRange(28))));
        assert!(matches!(parse_pin_string("board6"), Err(PinError::NotGpio(6))));
        assert!(matches!(parse_pin_string("board41"), Err(PinError::OutOfRange(41))));
        assert!(matches!(parse_pin_string("pin11"), Err(PinError::Syntax(_))));
        assert!(matches!(parse_pin_string(""), Err(PinError::Syntax(_))));
    }
}
