//! RGB Spectrum

use crate::lm::*;
use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};

/// Number of RGB samples.
pub const RGB_SAMPLES: usize = 3;

/// A linear RGB triple used for radiance, importance, reflectance and
/// throughput.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RGBSpectrum {
    c: [Float; RGB_SAMPLES],
}

impl RGBSpectrum {
    /// All zero.
    pub const ZERO: Self = Self { c: [0.0; RGB_SAMPLES] };

    /// All one.
    pub const ONE: Self = Self { c: [1.0; RGB_SAMPLES] };

    /// Create a new spectrum from RGB values.
    ///
    /// * `r` - Red.
    /// * `g` - Green.
    /// * `b` - Blue.
    pub const fn new(r: Float, g: Float, b: Float) -> Self {
        Self { c: [r, g, b] }
    }

    /// Create a spectrum with the same value in every channel.
    ///
    /// * `v` - The value.
    pub const fn splat(v: Float) -> Self {
        Self { c: [v; RGB_SAMPLES] }
    }

    /// Create a spectrum from an array.
    ///
    /// * `rgb` - RGB values.
    pub const fn from_rgb(rgb: [Float; 3]) -> Self {
        Self { c: rgb }
    }

    /// Returns the RGB values.
    pub fn to_rgb(&self) -> [Float; 3] {
        self.c
    }

    /// Red.
    pub fn r(&self) -> Float {
        self.c[0]
    }

    /// Green.
    pub fn g(&self) -> Float {
        self.c[1]
    }

    /// Blue.
    pub fn b(&self) -> Float {
        self.c[2]
    }

    /// Returns true if every channel is zero.
    pub fn is_black(&self) -> bool {
        self.c.iter().all(|v| *v == 0.0)
    }

    /// Returns true if any channel is NaN.
    pub fn has_nans(&self) -> bool {
        self.c.iter().any(|v| v.is_nan())
    }

    /// Returns true if no channel is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.c.iter().all(|v| v.is_finite())
    }

    /// Returns true if any channel is negative.
    pub fn has_negative(&self) -> bool {
        self.c.iter().any(|v| *v < 0.0)
    }

    /// Luminance (the y-coefficient of XYZ) using sRGB primaries.
    pub fn luminance(&self) -> Float {
        0.212671 * self.c[0] + 0.715160 * self.c[1] + 0.072169 * self.c[2]
    }

    /// Returns the largest channel value.
    pub fn max_component_value(&self) -> Float {
        self.c[1..].iter().fold(self.c[0], |m, v| max(m, *v))
    }

    /// Clamp every channel.
    ///
    /// * `low`  - Low value.
    /// * `high` - High value.
    pub fn clamp(&self, low: Float, high: Float) -> Self {
        Self::new(
            clamp(self.c[0], low, high),
            clamp(self.c[1], low, high),
            clamp(self.c[2], low, high),
        )
    }

    /// Channel-wise square root.
    pub fn sqrt(&self) -> Self {
        Self::new(self.c[0].sqrt(), self.c[1].sqrt(), self.c[2].sqrt())
    }

    /// Channel-wise division that yields zero where the divisor is zero.
    ///
    /// * `other` - The divisor.
    pub fn safe_div(&self, other: &Self) -> Self {
        let d = |a: Float, b: Float| if b == 0.0 { 0.0 } else { a / b };
        Self::new(d(self.c[0], other.c[0]), d(self.c[1], other.c[1]), d(self.c[2], other.c[2]))
    }
}

impl Add for RGBSpectrum {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.c[0] + other.c[0], self.c[1] + other.c[1], self.c[2] + other.c[2])
    }
}

impl AddAssign for RGBSpectrum {
    fn add_assign(&mut self, other: Self) {
        for i in 0..RGB_SAMPLES {
            self.c[i] += other.c[i];
        }
    }
}

impl Sub for RGBSpectrum {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.c[0] - other.c[0], self.c[1] - other.c[1], self.c[2] - other.c[2])
    }
}

impl SubAssign for RGBSpectrum {
    fn sub_assign(&mut self, other: Self) {
        for i in 0..RGB_SAMPLES {
            self.c[i] -= other.c[i];
        }
    }
}

impl Mul for RGBSpectrum {
    type Output = Self;

    fn mul(self, other: Self) -> Self {
        Self::new(self.c[0] * other.c[0], self.c[1] * other.c[1], self.c[2] * other.c[2])
    }
}

impl MulAssign for RGBSpectrum {
    fn mul_assign(&mut self, other: Self) {
        for i in 0..RGB_SAMPLES {
            self.c[i] *= other.c[i];
        }
    }
}

impl Mul<Float> for RGBSpectrum {
    type Output = Self;

    fn mul(self, f: Float) -> Self {
        Self::new(self.c[0] * f, self.c[1] * f, self.c[2] * f)
    }
}

impl Mul<RGBSpectrum> for Float {
    type Output = RGBSpectrum;

    fn mul(self, s: RGBSpectrum) -> RGBSpectrum {
        s * self
    }
}

impl MulAssign<Float> for RGBSpectrum {
    fn mul_assign(&mut self, f: Float) {
        for v in self.c.iter_mut() {
            *v *= f;
        }
    }
}

impl Div<Float> for RGBSpectrum {
    type Output = Self;

    fn div(self, f: Float) -> Self {
        debug_assert!(f != 0.0);
        let inv = 1.0 / f;
        self * inv
    }
}

impl DivAssign<Float> for RGBSpectrum {
    fn div_assign(&mut self, f: Float) {
        debug_assert!(f != 0.0);
        let inv = 1.0 / f;
        *self *= inv;
    }
}

impl Index<usize> for RGBSpectrum {
    type Output = Float;

    fn index(&self, i: usize) -> &Float {
        &self.c[i]
    }
}

impl IndexMut<usize> for RGBSpectrum {
    fn index_mut(&mut self, i: usize) -> &mut Float {
        &mut self.c[i]
    }
}

impl fmt::Display for RGBSpectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.c[0], self.c[1], self.c[2])
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn luminance_of_white_is_one() {
        assert!(approx_eq!(f64, RGBSpectrum::ONE.luminance(), 1.0, epsilon = 1e-6));
    }

    #[test]
    fn safe_div_handles_zero() {
        let a = RGBSpectrum::new(1.0, 2.0, 3.0);
        let b = RGBSpectrum::new(2.0, 0.0, 3.0);
        assert_eq!(a.safe_div(&b), RGBSpectrum::new(0.5, 0.0, 1.0));
    }

    #[test]
    fn finite_checks() {
        assert!(RGBSpectrum::ONE.is_finite());
        assert!(!RGBSpectrum::new(Float::NAN, 0.0, 0.0).is_finite());
        assert!(RGBSpectrum::new(Float::NAN, 0.0, 0.0).has_nans());
        assert!(RGBSpectrum::new(0.0, -1.0, 0.0).has_negative());
    }
}
