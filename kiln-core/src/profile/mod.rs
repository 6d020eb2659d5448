//! Firing profiles
//!
//! Converts operator segments into the time-indexed setpoint and
//! threshold tables the run loop follows.

pub mod segment;
pub mod table;

pub use segment::{
    check_length, validate_segments, ConfigurationError, Segment, MAX_PROFILE_MINUTES,
};
pub use table::{Profile, ProfilePoint};
