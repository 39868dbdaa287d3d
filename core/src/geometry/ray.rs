//! Ray

use super::*;
use crate::lm::*;

/// A semi-infinite line with a parametric range. Intersection routines shrink
/// `max_t` when a closer hit is found.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Ray {
    /// Origin.
    pub o: Vector3f,

    /// Unit direction.
    pub d: Vector3f,

    /// Minimum parameter.
    pub min_t: Float,

    /// Maximum parameter.
    pub max_t: Float,
}

impl Ray {
    /// Create a ray spanning [0, ∞).
    ///
    /// * `o` - Origin.
    /// * `d` - Direction.
    pub fn new(o: Vector3f, d: Vector3f) -> Self {
        Self {
            o,
            d,
            min_t: 0.0,
            max_t: INFINITY,
        }
    }

    /// Create a ray with an explicit parametric range.
    ///
    /// * `o`     - Origin.
    /// * `d`     - Direction.
    /// * `min_t` - Minimum parameter.
    /// * `max_t` - Maximum parameter.
    pub fn with_range(o: Vector3f, d: Vector3f, min_t: Float, max_t: Float) -> Self {
        Self { o, d, min_t, max_t }
    }

    /// Create a ray leaving a surface point; the origin offset is `EPS`.
    ///
    /// * `o` - Origin.
    /// * `d` - Direction.
    pub fn spawn(o: Vector3f, d: Vector3f) -> Self {
        Self::with_range(o, d, EPS, INFINITY)
    }

    /// Create a shadow ray between two points, trimmed by `EPS` at both ends.
    /// Returns `None` when the points coincide.
    ///
    /// * `from` - Start point.
    /// * `to`   - End point.
    pub fn shadow(from: Vector3f, to: Vector3f) -> Option<Self> {
        let v = to - from;
        let dist = v.length();
        if dist < EPS {
            None
        } else {
            Some(Self::with_range(from, v / dist, EPS, dist * (1.0 - EPS)))
        }
    }

    /// Returns the point at parameter `t`.
    ///
    /// * `t` - The parameter.
    #[inline(always)]
    pub fn at(&self, t: Float) -> Vector3f {
        self.o + self.d * t
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_ray_is_trimmed() {
        let r = Ray::shadow(Vector3f::ZERO, Vector3f::new(0.0, 0.0, 2.0)).unwrap();
        assert_eq!(r.d, Vector3f::Z);
        assert!(r.min_t > 0.0);
        assert!(r.max_t < 2.0);
        assert!(Ray::shadow(Vector3f::ZERO, Vector3f::ZERO).is_none());
    }

    #[test]
    fn at_moves_along_direction() {
        let r = Ray::new(Vector3f::new(1.0, 0.0, 0.0), Vector3f::Y);
        assert_eq!(r.at(2.0), Vector3f::new(1.0, 2.0, 0.0));
    }
}
