//! Orthonormal Frames

use super::*;
use crate::lm::Float;

/// Builds two unit tangent vectors `(s, t)` such that `{s, t, n}` is a right
/// handed orthonormal basis. Only `n` is needed, so the result is stable for
/// any unit normal.
///
/// * `n` - Unit normal.
pub fn orthonormal_basis(n: &Vector3f) -> (Vector3f, Vector3f) {
    let t = if n.x.abs() > n.y.abs() {
        Vector3f::new(n.z, 0.0, -n.x).normalize()
    } else {
        Vector3f::new(0.0, n.z, -n.y).normalize()
    };
    let s = t.cross(n).normalize();
    (s, t)
}

/// A right handed orthonormal frame. Local coordinates use `n` as the z-axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frame {
    /// First tangent.
    pub s: Vector3f,

    /// Second tangent.
    pub t: Vector3f,

    /// Normal.
    pub n: Vector3f,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            s: Vector3f::X,
            t: Vector3f::Y,
            n: Vector3f::Z,
        }
    }
}

impl Frame {
    /// Creates a frame around a normal.
    ///
    /// * `n` - Unit normal.
    pub fn from_normal(n: &Vector3f) -> Self {
        let (s, t) = orthonormal_basis(n);
        Self { s, t, n: *n }
    }

    /// Converts a world space vector into the local frame.
    ///
    /// * `v` - The vector.
    #[inline(always)]
    pub fn to_local(&self, v: &Vector3f) -> Vector3f {
        Vector3f::new(v.dot(&self.s), v.dot(&self.t), v.dot(&self.n))
    }

    /// Converts a local vector into world space.
    ///
    /// * `v` - The vector.
    #[inline(always)]
    pub fn to_world(&self, v: &Vector3f) -> Vector3f {
        self.s * v.x + self.t * v.y + self.n * v.z
    }
}

/// Cosine of the angle between a local direction and the z-axis.
#[inline(always)]
pub fn cos_theta_z_up(v: &Vector3f) -> Float {
    v.z
}

/// Mirror a local direction about the z-axis.
#[inline(always)]
pub fn reflect_z_up(v: &Vector3f) -> Vector3f {
    Vector3f::new(-v.x, -v.y, v.z)
}

/// Refract a local direction through the xy-plane given the relative index of
/// refraction and the already computed transmitted cosine.
///
/// * `v`           - Incident direction, pointing away from the surface.
/// * `eta`         - Ratio of incident to transmitted index of refraction.
/// * `cos_theta_t` - Signed cosine of the transmitted direction.
#[inline(always)]
pub fn refract_z_up(v: &Vector3f, eta: Float, cos_theta_t: Float) -> Vector3f {
    Vector3f::new(-eta * v.x, -eta * v.y, cos_theta_t)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    prop_unit_vector3!(unit_vector);

    proptest! {
        #[test]
        fn basis_is_right_handed_and_orthonormal(n in unit_vector()) {
            let f = Frame::from_normal(&n);
            prop_assert!(approx_eq!(f64, f.s.length(), 1.0, epsilon = 1e-9));
            prop_assert!(approx_eq!(f64, f.t.length(), 1.0, epsilon = 1e-9));
            prop_assert!(f.s.dot(&f.t).abs() < 1e-9);
            prop_assert!(f.s.dot(&f.n).abs() < 1e-9);
            prop_assert!(f.t.dot(&f.n).abs() < 1e-9);
            let c = f.s.cross(&f.t);
            prop_assert!((c - f.n).length() < 1e-9);
        }

        #[test]
        fn local_world_conversion_is_inverse(n in unit_vector(), v in unit_vector()) {
            let f = Frame::from_normal(&n);
            let w = f.to_world(&f.to_local(&v));
            prop_assert!((w - v).length() < 1e-9);
        }
    }

    #[test]
    fn normal_maps_to_z_up() {
        let n = Vector3f::new(1.0, 2.0, -3.0).normalize();
        let f = Frame::from_normal(&n);
        let l = f.to_local(&n);
        assert!(approx_eq!(f64, cos_theta_z_up(&l), 1.0, epsilon = 1e-12));
    }
}
