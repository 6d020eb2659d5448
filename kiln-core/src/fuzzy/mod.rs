//! Fuzzy-logic heater controller
//!
//! Maps the tracking error (measured minus setpoint) and its change since
//! the previous tick to a heater duty cycle in `[0, 1]`. The universes of
//! discourse for both inputs widen whenever an input falls outside them
//! and never shrink during a run.

pub mod membership;
pub mod rules;

pub use membership::{memberships, TERMS};
pub use rules::{defuzzify, heat_level, rule_matrix, RuleMatrix, HEAT_LEVELS};

/// Smallest universe half-width; keeps memberships finite when an input
/// and its configured range are both zero
pub const EPSILON_RANGE: f64 = 0.01;

/// Result of one controller evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyOutput {
    /// Fraction of the control interval to energize the heater
    pub duty: f64,
    /// Error universe after widening
    pub erange: f64,
    /// Delta universe after widening
    pub drange: f64,
}

/// Widen a universe so it contains `x`
pub fn widen(range: f64, x: f64) -> f64 {
    let widened = if x.abs() > range { x.abs() } else { range };
    if widened == 0.0 {
        EPSILON_RANGE
    } else {
        widened
    }
}

/// Evaluate the controller once
///
/// Pure: the same inputs always give the same output.
pub fn step(error: f64, delta: f64, erange: f64, drange: f64) -> FuzzyOutput {
    let erange = widen(erange, error);
    let drange = widen(drange, delta);

    let dom_error = memberships(error, erange);
    let dom_delta = memberships(delta, drange);
    let duty = defuzzify(&rule_matrix(&dom_error, &dom_delta));

    FuzzyOutput {
        duty,
        erange,
        drange,
    }
}

/// Stateful wrapper holding the widened universes across ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyController {
    erange: f64,
    drange: f64,
}

impl FuzzyController {
    pub fn new(erange: f64, drange: f64) -> Self {
        Self { erange, drange }
    }

    /// Compute the duty for this tick and keep the widened universes
    pub fn update(&mut self, error: f64, delta: f64) -> f64 {
        let out = step(error, delta, self.erange, self.drange);
        self.erange = out.erange;
        self.drange = out.drange;
        out.duty
    }

    pub fn erange(&self) -> f64 {
        self.erange
    }

    pub fn drange(&self) -> f64 {
        self.drange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_on_setpoint_and_steady_is_off() {
        let out = step(0.0, 0.0, 5.0, 5.0);
        assert_eq!(out.duty, 0.0);
    }

    #[test]
    fn test_far_below_setpoint_full_heat() {
        // error and delta at negative big
        let out = step(-5.0, -5.0, 5.0, 5.0);
        assert_eq!(out.duty, 1.0);
    }

    #[test]
    fn test_above_setpoint_no_heat() {
        let out = step(4.0, 1.0, 5.0, 5.0);
        assert_eq!(out.duty, 0.0);
    }

    #[test]
    fn test_widening() {
        let out = step(-40.0, 3.0, 5.0, 5.0);
        assert_eq!(out.erange, 40.0);
        assert_eq!(out.drange, 5.0);
        // error is exactly negative big in the widened universe
        assert_eq!(memberships(-40.0, out.erange)[0], 1.0);
    }

    #[test]
    fn test_zero_ranges_never_divide_by_zero() {
        let out = step(0.0, 0.0, 0.0, 0.0);
        assert_eq!(out.erange, EPSILON_RANGE);
        assert_eq!(out.drange, EPSILON_RANGE);
        assert!(out.duty.is_finite());
    }

    #[test]
    fn test_controller_keeps_widest_range() {
        let mut fc = FuzzyController::new(5.0, 5.0);
        fc.update(-20.0, -20.0);
        fc.update(-1.0, 19.0);
        assert_eq!(fc.erange(), 20.0);
        assert_eq!(fc.drange(), 20.0);
    }

    proptest! {
        #[test]
        fn prop_duty_in_unit_interval(
            error in -3000.0f64..3000.0,
            delta in -500.0f64..500.0,
            erange in 0.0f64..100.0,
            drange in 0.0f64..100.0,
        ) {
            let out = step(error, delta, erange, drange);
            prop_assert!((0.0..=1.0).contains(&out.duty));
        }

        #[test]
        fn prop_ranges_never_shrink(
            errors in proptest::collection::vec(-1000.0f64..1000.0, 1..50),
            start in 0.0f64..50.0,
        ) {
            let mut fc = FuzzyController::new(start, start);
            let mut previous = (fc.erange(), fc.drange());
            for e in errors {
                fc.update(e, e / 2.0);
                prop_assert!(fc.erange() >= previous.0);
                prop_assert!(fc.drange() >= previous.1);
                prop_assert!(fc.erange() > 0.0 && fc.drange() > 0.0);
                previous = (fc.erange(), fc.drange());
            }
        }
    }
}
