//! Temperature sensor drivers

pub mod max31855;

pub use max31855::{Frame, Max31855, RetryPolicy};
