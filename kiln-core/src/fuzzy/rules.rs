//! Rule matrix and defuzzification
//!
//! Rule `(i, j)` fires with strength `min(error_term[i], delta_term[j])`.
//! Only rules where the kiln is below setpoint and not already heating
//! fast ask for heat; the heat level falls off by anti-diagonal distance
//! from `(NB, NB)`.

use super::membership::TERMS;

/// Heat level requested by each anti-diagonal `i + j`
pub const HEAT_LEVELS: [f64; 4] = [1.0, 0.75, 0.5, 0.25];

/// Rule firing strengths
pub type RuleMatrix = [[f64; TERMS]; TERMS];

/// Combine error and delta memberships into rule strengths
pub fn rule_matrix(dom_error: &[f64; TERMS], dom_delta: &[f64; TERMS]) -> RuleMatrix {
    let mut m = [[0.0; TERMS]; TERMS];
    for (i, row) in m.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = dom_error[i].min(dom_delta[j]);
        }
    }
    m
}

/// Heat level of rule `(i, j)`
pub fn heat_level(i: usize, j: usize) -> f64 {
    HEAT_LEVELS.get(i + j).copied().unwrap_or(0.0)
}

/// Weighted root-sum-square defuzzification
///
/// Each heat level contributes its weight times the root of the summed
/// squares of the rules at that level; the total is normalised by the
/// root of the summed squares of all 25 rules. Returns exactly 0 when no
/// rule fires. The result is clamped to `[0, 1]`, since two adjacent
/// terms firing on both inputs can push the weighted sum above 1.
pub fn defuzzify(m: &RuleMatrix) -> f64 {
    let mut level_squares = [0.0; HEAT_LEVELS.len()];
    let mut total_squares = 0.0;

    for (i, row) in m.iter().enumerate() {
        for (j, &strength) in row.iter().enumerate() {
            let square = strength * strength;
            total_squares += square;
            if let Some(slot) = level_squares.get_mut(i + j) {
                *slot += square;
            }
        }
    }

    if total_squares == 0.0 {
        return 0.0;
    }

    let numerator: f64 = HEAT_LEVELS
        .iter()
        .zip(level_squares)
        .map(|(level, squares)| level * squares.sqrt())
        .sum();

    (numerator / total_squares.sqrt()).clamp(0.0, 1.0)
}
