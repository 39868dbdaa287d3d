//! Transformations

use super::*;
use crate::lm::*;
use std::ops::Mul;

/// A transformation for mapping points to points and vectors to vectors. Both
/// the matrix and its inverse are kept so normals can be transformed without
/// recomputing an inverse.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Transform {
    /// The transformation matrix.
    pub m: Matrix4x4,

    /// The inverse transformation matrix.
    pub m_inv: Matrix4x4,
}

impl Transform {
    /// Identity transformation.
    pub const IDENTITY: Self = Self {
        m: Matrix4x4::IDENTITY,
        m_inv: Matrix4x4::IDENTITY,
    };

    /// Create a transformation from a matrix. Returns `None` if the matrix is
    /// singular.
    ///
    /// * `m` - The matrix.
    pub fn from_matrix(m: Matrix4x4) -> Option<Self> {
        m.inverse().map(|m_inv| Self { m, m_inv })
    }

    /// Create a transformation representing a translation.
    ///
    /// * `delta` - Translation.
    #[rustfmt::skip]
    pub fn translate(delta: &Vector3f) -> Self {
        Self {
            m: Matrix4x4::new([
                [1.0, 0.0, 0.0, delta.x],
                [0.0, 1.0, 0.0, delta.y],
                [0.0, 0.0, 1.0, delta.z],
                [0.0, 0.0, 0.0, 1.0],
            ]),
            m_inv: Matrix4x4::new([
                [1.0, 0.0, 0.0, -delta.x],
                [0.0, 1.0, 0.0, -delta.y],
                [0.0, 0.0, 1.0, -delta.z],
                [0.0, 0.0, 0.0,  1.0],
            ]),
        }
    }

    /// Create a transformation representing a scale.
    ///
    /// * `s` - Scaling factors per axis.
    #[rustfmt::skip]
    pub fn scale(s: &Vector3f) -> Self {
        Self {
            m: Matrix4x4::new([
                [s.x, 0.0, 0.0, 0.0],
                [0.0, s.y, 0.0, 0.0],
                [0.0, 0.0, s.z, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]),
            m_inv: Matrix4x4::new([
                [1.0 / s.x, 0.0,       0.0,       0.0],
                [0.0,       1.0 / s.y, 0.0,       0.0],
                [0.0,       0.0,       1.0 / s.z, 0.0],
                [0.0,       0.0,       0.0,       1.0],
            ]),
        }
    }

    /// Create a transformation representing rotation about an axis.
    ///
    /// * `theta` - Angle in degrees.
    /// * `axis`  - Rotation axis. Need not be normalized.
    pub fn rotate(theta: Float, axis: &Vector3f) -> Self {
        let a = axis.normalize();
        let r = radians(theta);
        let sin_theta = r.sin();
        let cos_theta = r.cos();
        let mut m = Matrix4x4::IDENTITY;

        // Compute rotation of first basis vector
        m.m[0][0] = a.x * a.x + (1.0 - a.x * a.x) * cos_theta;
        m.m[0][1] = a.x * a.y * (1.0 - cos_theta) - a.z * sin_theta;
        m.m[0][2] = a.x * a.z * (1.0 - cos_theta) + a.y * sin_theta;

        // Compute rotations of second and third basis vectors
        m.m[1][0] = a.x * a.y * (1.0 - cos_theta) + a.z * sin_theta;
        m.m[1][1] = a.y * a.y + (1.0 - a.y * a.y) * cos_theta;
        m.m[1][2] = a.y * a.z * (1.0 - cos_theta) - a.x * sin_theta;

        m.m[2][0] = a.x * a.z * (1.0 - cos_theta) - a.y * sin_theta;
        m.m[2][1] = a.y * a.z * (1.0 - cos_theta) + a.x * sin_theta;
        m.m[2][2] = a.z * a.z + (1.0 - a.z * a.z) * cos_theta;

        Self {
            m,
            m_inv: m.transpose(),
        }
    }

    /// Create a view transformation (world to camera) for a camera placed at
    /// `eye` looking at `center`. The camera looks down its local -z axis.
    ///
    /// * `eye`    - Position of the camera.
    /// * `center` - Position to look at.
    /// * `up`     - Approximate up direction.
    #[rustfmt::skip]
    pub fn look_at(eye: &Vector3f, center: &Vector3f, up: &Vector3f) -> Option<Self> {
        let f = (*center - *eye).normalize();
        let s = f.cross(up).normalize();
        let u = s.cross(&f);
        if s.has_nans() {
            return None;
        }

        Self::from_matrix(Matrix4x4::new([
            [ s.x,  s.y,  s.z, -s.dot(eye)],
            [ u.x,  u.y,  u.z, -u.dot(eye)],
            [-f.x, -f.y, -f.z,  f.dot(eye)],
            [ 0.0,  0.0,  0.0,  1.0],
        ]))
    }

    /// Create a perspective projection from camera space to normalized device
    /// coordinates in [-1, 1]^3.
    ///
    /// * `fovy`   - Vertical field of view in degrees.
    /// * `aspect` - Width / height of the image.
    /// * `near`   - Near plane distance.
    /// * `far`    - Far plane distance.
    #[rustfmt::skip]
    pub fn perspective(fovy: Float, aspect: Float, near: Float, far: Float) -> Option<Self> {
        let f = 1.0 / (radians(fovy) * 0.5).tan();
        Self::from_matrix(Matrix4x4::new([
            [f / aspect, 0.0, 0.0,                          0.0],
            [0.0,        f,   0.0,                          0.0],
            [0.0,        0.0, (far + near) / (near - far),  2.0 * far * near / (near - far)],
            [0.0,        0.0, -1.0,                         0.0],
        ]))
    }

    /// Returns the inverse transformation.
    pub fn inverse(&self) -> Self {
        Self {
            m: self.m_inv,
            m_inv: self.m,
        }
    }

    /// Returns true if matrix is identity matrix
    pub fn is_identity(&self) -> bool {
        self.m == Matrix4x4::IDENTITY
    }

    /// Applies transformation to a given point (w = 1).
    ///
    /// * `p` - The point.
    pub fn transform_point(&self, p: &Vector3f) -> Vector3f {
        let m = &self.m;
        Vector3f::new(
            m[0][0] * p.x + m[0][1] * p.y + m[0][2] * p.z + m[0][3],
            m[1][0] * p.x + m[1][1] * p.y + m[1][2] * p.z + m[1][3],
            m[2][0] * p.x + m[2][1] * p.y + m[2][2] * p.z + m[2][3],
        )
    }

    /// Applies transformation to a given point and divides by the resulting
    /// homogeneous coordinate. Returns the projected point and w.
    ///
    /// * `p` - The point.
    pub fn transform_point_projective(&self, p: &Vector3f) -> (Vector3f, Float) {
        let m = &self.m;
        let wp = m[3][0] * p.x + m[3][1] * p.y + m[3][2] * p.z + m[3][3];
        let q = self.transform_point(p);
        if wp == 0.0 {
            (q, wp)
        } else {
            (q / wp, wp)
        }
    }

    /// Applies transformation to a given vector (w = 0).
    ///
    /// * `v` - The vector.
    pub fn transform_vector(&self, v: &Vector3f) -> Vector3f {
        let m = &self.m;
        Vector3f::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }

    /// Applies the inverse transpose to a given normal. The result is not
    /// normalized.
    ///
    /// * `n` - The normal.
    pub fn transform_normal(&self, n: &Vector3f) -> Vector3f {
        let m_inv = &self.m_inv.m;
        Vector3f::new(
            m_inv[0][0] * n.x + m_inv[1][0] * n.y + m_inv[2][0] * n.z,
            m_inv[0][1] * n.x + m_inv[1][1] * n.y + m_inv[2][1] * n.z,
            m_inv[0][2] * n.x + m_inv[1][2] * n.y + m_inv[2][2] * n.z,
        )
    }
}

impl Mul<Transform> for Transform {
    type Output = Transform;

    /// Composes with another transformation; the right hand side is applied
    /// first.
    ///
    /// * `t2` - The transformation to compose.
    fn mul(self, t2: Transform) -> Self::Output {
        Transform {
            m: self.m * t2.m,
            m_inv: t2.m_inv * self.m_inv,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn assert_vec_eq(a: Vector3f, b: Vector3f) {
        assert!(approx_eq!(f64, a.x, b.x, epsilon = 1e-9), "{} != {}", a, b);
        assert!(approx_eq!(f64, a.y, b.y, epsilon = 1e-9), "{} != {}", a, b);
        assert!(approx_eq!(f64, a.z, b.z, epsilon = 1e-9), "{} != {}", a, b);
    }

    #[test]
    fn rotate_uses_degrees() {
        let t = Transform::rotate(90.0, &Vector3f::Z);
        assert_vec_eq(t.transform_vector(&Vector3f::X), Vector3f::Y);
    }

    #[test]
    fn composition_applies_right_hand_side_first() {
        let t = Transform::translate(&Vector3f::new(1.0, 0.0, 0.0)) * Transform::scale(&Vector3f::splat(2.0));
        assert_vec_eq(t.transform_point(&Vector3f::new(1.0, 1.0, 1.0)), Vector3f::new(3.0, 2.0, 2.0));
        assert_vec_eq(t.inverse().transform_point(&Vector3f::new(3.0, 2.0, 2.0)), Vector3f::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn normals_stay_perpendicular_under_non_uniform_scale() {
        let t = Transform::scale(&Vector3f::new(1.0, 4.0, 1.0));
        let tangent = Vector3f::new(1.0, -1.0, 0.0);
        let normal = Vector3f::new(1.0, 1.0, 0.0);
        let tt = t.transform_vector(&tangent);
        let tn = t.transform_normal(&normal);
        assert!(tt.dot(&tn).abs() < 1e-12);
    }

    #[test]
    fn look_at_maps_eye_to_origin() {
        let eye = Vector3f::new(0.0, 1.0, 5.0);
        let view = Transform::look_at(&eye, &Vector3f::ZERO, &Vector3f::Y).unwrap();
        assert_vec_eq(view.transform_point(&eye), Vector3f::ZERO);
        // The look direction maps to -z.
        let d = view.transform_vector(&(Vector3f::ZERO - eye).normalize());
        assert_vec_eq(d, -Vector3f::Z);
    }

    #[test]
    fn perspective_maps_near_plane_corners_to_ndc() {
        let proj = Transform::perspective(90.0, 1.0, 1.0, 1000.0).unwrap();
        let (p, _) = proj.transform_point_projective(&Vector3f::new(1.0, 1.0, -1.0));
        assert_vec_eq(p, Vector3f::new(1.0, 1.0, -1.0));
    }

    proptest! {
        #[test]
        fn rotation_preserves_length(
            theta in -360.0..360.0f64,
            x in -1.0..1.0f64, y in -1.0..1.0f64, z in 0.1..1.0f64,
        ) {
            let t = Transform::rotate(theta, &Vector3f::new(x, y, z));
            let v = Vector3f::new(0.3, -0.2, 0.9);
            prop_assert!(approx_eq!(f64, t.transform_vector(&v).length(), v.length(), epsilon = 1e-9));
        }
    }
}
