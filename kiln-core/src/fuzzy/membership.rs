//! Triangular membership functions
//!
//! Five terms over a symmetric universe `[-r, r]`: negative big, negative
//! small, zero, positive small, positive big. Their peaks sit at
//! `-r, -r/2, 0, r/2, r` and neighbouring triangles overlap so that any
//! input in the universe belongs to at most two adjacent terms with
//! degrees summing to one.

/// Number of linguistic terms per input
pub const TERMS: usize = 5;

/// Degree of membership of `x` in each term, for a universe of `range`
///
/// Regions are half-open (`[-r,-r/2)`, `[-r/2,0)`, `[0,r/2)`, `[r/2,r]`),
/// so a breakpoint belongs to exactly one region. Inputs outside the
/// universe (or NaN) belong to no term.
pub fn memberships(x: f64, range: f64) -> [f64; TERMS] {
    let r = range;
    let t = 2.0 * x / r;

    if x >= -r && x < -r / 2.0 {
        [-t - 1.0, t + 2.0, 0.0, 0.0, 0.0]
    } else if x >= -r / 2.0 && x < 0.0 {
        [0.0, -t, t + 1.0, 0.0, 0.0]
    } else if x >= 0.0 && x < r / 2.0 {
        [0.0, 0.0, 1.0 - t, t, 0.0]
    } else if x >= r / 2.0 && x <= r {
        [0.0, 0.0, 0.0, 2.0 - t, t - 1.0]
    } else {
        [0.0; TERMS]
    }
}
