//! Kiln Hardware Abstraction Layer
//!
//! This crate defines the hardware abstraction traits the controller is
//! written against. A board backend (Raspberry Pi via `kiln-hal-rpi`) or
//! the in-process simulation implements them, and the daemon picks one at
//! start-up from its configuration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (kiln-daemon)              │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  kiln-hal (this crate - traits)         │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ kiln-hal-rpi  │       │ kiln-hal::sim │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::OutputPin`], [`gpio::InputPin`] - Digital I/O
//! - [`bitbang::BitBangBus`] - Three-wire synchronous read-only bus
//!
//! Blocking delays use [`embedded_hal::delay::DelayNs`]; [`delay::StdDelay`]
//! implements it on top of the OS scheduler.

#![deny(unsafe_code)]

pub mod bitbang;
pub mod delay;
pub mod gpio;
pub mod sim;

// Re-export key traits at crate root for convenience
pub use bitbang::{BitBangBus, PinBus};
pub use delay::StdDelay;
pub use gpio::{InputPin, OutputPin};
