//! Run lifecycle state machine
//!
//! Defines the authoritative lifecycle of a firing run.
//! The state machine is explicit, finite, and deterministic.

pub mod machine;

pub use machine::{InvalidTransition, Request, RunState};
