//! Numeric foundations shared by the clippable-face algebra and CAG.

pub mod rational;

use nalgebra::{ClosedAddAssign, ClosedMulAssign, Scalar};
pub use num_traits::Float;

/// Bound satisfied by every floating-point type used throughout the crate's
/// analytic integrals (area, centroid, filter convolutions).
pub trait FloatScalar: Float + Scalar + ClosedAddAssign + ClosedMulAssign {}

impl<T> FloatScalar for T where T: Float + Scalar + ClosedAddAssign + ClosedMulAssign {}

/// Clamp `v` into `[lo, hi]`.
#[inline]
pub fn clamp<T: PartialOrd>(v: T, lo: T, hi: T) -> T {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// Returns true if `a` and `b` agree to within `eps`.
#[inline]
pub fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps
}
