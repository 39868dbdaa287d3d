//! Common

use num_traits::{Num, Zero};
use std::ops::Neg;

/// Use 64-bit precision for floating point numbers.
pub type Float = f64;

/// Default signed integer to 32-bit.
pub type Int = i32;

/// Infinty (∞)
pub const INFINITY: Float = Float::INFINITY;

/// PI (π)
pub const PI: Float = std::f64::consts::PI;

/// 1/PI (1/π)
pub const INV_PI: Float = std::f64::consts::FRAC_1_PI;

/// PI/2 (π/2)
pub const PI_OVER_TWO: Float = PI * 0.5;

/// PI/4 (π/4)
pub const PI_OVER_FOUR: Float = PI * 0.25;

/// 2*PI (2π)
pub const TWO_PI: Float = PI * 2.0;

/// 1/2*PI (1/2π)
pub const INV_TWO_PI: Float = 1.0 / TWO_PI;

/// 4*PI (4π)
pub const FOUR_PI: Float = PI * 4.0;

/// 1/4*PI (1/4π)
pub const INV_FOUR_PI: Float = 1.0 / FOUR_PI;

/// Machine Epsilon
pub const MACHINE_EPSILON: Float = std::f64::EPSILON * 0.5;

/// Offset used for ray origins and shadow ray trimming.
pub const EPS: Float = 1e-7;

/// Looser tolerance used for geometric comparisons such as the mirror direction
/// check and the near-singular geometry term guard.
pub const EPS_LARGE: Float = 1e-5;

/// Largest `Float` strictly less than one.
pub const ONE_MINUS_EPSILON: Float = hexf64!("0x1.fffffffffffffp-1");

/// Returns the absolute value of a number.
///
/// * `n` - The number.
#[inline(always)]
pub fn abs<T>(n: T) -> T
where
    T: Num + Neg<Output = T> + PartialOrd + Copy,
{
    if n < T::zero() {
        -n
    } else {
        n
    }
}

/// Returns the minimum of 2 numbers.
///
/// * `a` - First number.
/// * `b` - Second number.
#[inline(always)]
pub fn min<T>(a: T, b: T) -> T
where
    T: PartialOrd + Copy,
{
    if a < b {
        a
    } else {
        b
    }
}

/// Returns the maximum of 2 numbers.
///
/// * `a` - First number.
/// * `b` - Second number.
#[inline(always)]
pub fn max<T>(a: T, b: T) -> T
where
    T: PartialOrd + Copy,
{
    if a > b {
        a
    } else {
        b
    }
}

/// Clamp the given value to the range [low, high].
///
/// * `val`  - Value to clamp.
/// * `low`  - Low value.
/// * `high` - High value.
#[inline(always)]
pub fn clamp<T>(val: T, low: T, high: T) -> T
where
    T: PartialOrd + Copy,
{
    if val < low {
        low
    } else if val > high {
        high
    } else {
        val
    }
}

/// Computes a mod b (the remainder of a divided by b). This version
/// ensures that modulus of a negative number is zero or positive.
///
/// * `a` - Dividend.
/// * `b` - Divisor.
#[inline(always)]
pub fn rem<T>(a: T, b: T) -> T
where
    T: Num + Zero + PartialOrd + Copy,
{
    let result = a - (a / b) * b;
    if result < T::zero() {
        result + b
    } else {
        result
    }
}

/// Returns the error bound for adding n terms.
///
/// * `n` - Number of terms
#[inline(always)]
pub fn gamma(n: Int) -> Float {
    (n as Float * MACHINE_EPSILON) / (1.0 - n as Float * MACHINE_EPSILON)
}

/// Returns gamma corrected values for use in 8-bit images.
///
/// * `value` - Value to correct.
#[inline(always)]
pub fn gamma_correct(value: Float) -> Float {
    if value <= 0.0031308 {
        12.92 * value
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

/// Returns inverse of a gamma corrected value.
///
/// * `value` - The value.
#[inline(always)]
pub fn inv_gamma_correct(value: Float) -> Float {
    if value <= 0.04045 {
        value * 1.0 / 12.92
    } else {
        ((value + 0.055) * 1.0 / 1.055).powf(2.4)
    }
}

/// Convert degrees to radians.
///
/// * `deg` - Angle in degrees.
#[inline(always)]
pub fn radians(deg: Float) -> Float {
    (PI / 180.0) * deg
}

/// Bump a single precision value up to the next greater representable value.
///
/// * `v` - Floating point value.
pub fn next_f32_up(v: f32) -> f32 {
    if v.is_infinite() && v > 0.0 {
        return v;
    }

    let nv = if v == -0.0 { 0.0 } else { v };
    let ui = nv.to_bits();
    f32::from_bits(if nv >= 0.0 { ui + 1 } else { ui - 1 })
}

/// Bump a single precision value down to the next lower representable value.
///
/// * `v` - Floating point value.
pub fn next_f32_down(v: f32) -> f32 {
    if v.is_infinite() && v < 0.0 {
        return v;
    }

    let nv = if v == 0.0 { -0.0 } else { v };
    let ui = nv.to_bits();
    f32::from_bits(if nv > 0.0 { ui - 1 } else { ui + 1 })
}

/// Round a double precision value down to a single precision value that is not
/// greater than the input.
///
/// * `v` - Floating point value.
pub fn f32_round_down(v: Float) -> f32 {
    let f = v as f32;
    if f as Float > v {
        next_f32_down(f)
    } else {
        f
    }
}

/// Round a double precision value up to a single precision value that is not
/// less than the input.
///
/// * `v` - Floating point value.
pub fn f32_round_up(v: Float) -> f32 {
    let f = v as f32;
    if (f as Float) < v {
        next_f32_up(f)
    } else {
        f
    }
}

/// Returns `true` if the value is neither NaN nor infinite.
///
/// * `v` - The value.
#[inline(always)]
pub fn is_finite(v: Float) -> bool {
    v.is_finite()
}

/// Returns the inverse of the error function.
///
/// * `x` - Value in (-1, 1); clamped to +-0.99999.
#[inline(always)]
pub fn erf_inv(x: Float) -> Float {
    let x = clamp(x, -0.99999, 0.99999);
    let mut w = -((1.0 - x) * (1.0 + x)).ln();
    if w < 5.0 {
        w -= 2.5;
        let mut p = 2.81022636e-08;
        p = 3.43273939e-07 + p * w;
        p = -3.5233877e-06 + p * w;
        p = -4.39150654e-06 + p * w;
        p = 0.00021858087 + p * w;
        p = -0.00125372503 + p * w;
        p = -0.00417768164 + p * w;
        p = 0.246640727 + p * w;
        p = 1.50140941 + p * w;
        p * x
    } else {
        w = w.sqrt() - 3.0;
        let mut p = -0.000200214257;
        p = 0.000100950558 + p * w;
        p = 0.00134934322 + p * w;
        p = -0.00367342844 + p * w;
        p = 0.00573950773 + p * w;
        p = -0.0076224613 + p * w;
        p = 0.00943887047 + p * w;
        p = 1.00167406 + p * w;
        p = 2.83297682 + p * w;
        p * x
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(-1.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(2, 0, 1), 1);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
    }

    #[test]
    fn rem_is_non_negative() {
        assert_eq!(rem(-1, 3), 2);
        assert_eq!(rem(4, 3), 1);
    }

    #[test]
    fn erf_inv_inverts_known_values() {
        assert_eq!(erf_inv(0.0), 0.0);
        assert!((erf_inv(0.5) - 0.4769362762).abs() < 1e-5);
        assert!((erf_inv(-0.5) + 0.4769362762).abs() < 1e-5);
    }

    #[test]
    fn one_minus_epsilon_is_below_one() {
        assert!(ONE_MINUS_EPSILON < 1.0);
        assert_eq!(ONE_MINUS_EPSILON.to_bits() + 1, (1.0 as Float).to_bits());
    }

    proptest! {
        #[test]
        fn f32_rounding_brackets_input(v in -1.0e6..1.0e6f64) {
            prop_assert!(f32_round_down(v) as Float <= v);
            prop_assert!(f32_round_up(v) as Float >= v);
        }

        #[test]
        fn next_f32_moves_strictly(v in -1.0e6..1.0e6f32) {
            prop_assert!(next_f32_up(v) > v);
            prop_assert!(next_f32_down(v) < v);
        }
    }
}
