//! Raspberry Pi backend for the kiln controller
//!
//! This crate provides Raspberry Pi specific implementations:
//! - Pin strings from config (`gpio21`, `board40`, `!board31`)
//! - Physical header to BCM numbering
//! - GPIO allocation so a line is never claimed twice
//! - `kiln-hal` pin traits over `rppal`

#![deny(unsafe_code)]

pub mod gpio;
pub mod pins;

pub use gpio::{parse_pin_string, GpioAllocator, PinError, PinSpec};
pub use pins::{RpiGpio, RpiInput, RpiOutput};
