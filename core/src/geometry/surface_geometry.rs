//! Surface Geometry

use super::*;
use crate::lm::*;

/// Geometry of a point on a surface. Normals and tangents are meaningful only
/// when the point is not positionally degenerate (pinhole cameras, directional
/// emitters).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SurfaceGeometry {
    /// `true` if the point has no surrounding surface area.
    pub degenerated: bool,

    /// Position.
    pub p: Vector3f,

    /// Geometric normal.
    pub gn: Vector3f,

    /// Shading normal.
    pub sn: Vector3f,

    /// First shading tangent.
    pub ss: Vector3f,

    /// Second shading tangent.
    pub st: Vector3f,

    /// Texture coordinates.
    pub uv: Vector2f,
}

impl SurfaceGeometry {
    /// Creates geometry for a point on a surface and computes the shading
    /// tangent space from the shading normal.
    ///
    /// * `p`  - Position.
    /// * `gn` - Geometric normal.
    /// * `sn` - Shading normal. Normalized here.
    /// * `uv` - Texture coordinates.
    pub fn new(p: Vector3f, gn: Vector3f, sn: Vector3f, uv: Vector2f) -> Self {
        let mut geom = Self {
            degenerated: false,
            p,
            gn,
            sn: sn.normalize(),
            ss: Vector3f::ZERO,
            st: Vector3f::ZERO,
            uv,
        };
        geom.compute_tangent_space();
        geom
    }

    /// Creates geometry for a positionally degenerate point.
    ///
    /// * `p` - Position.
    pub fn degenerated(p: Vector3f) -> Self {
        Self {
            degenerated: true,
            p,
            ..Default::default()
        }
    }

    /// Creates a non-degenerate point with a single normal and a frame aligned
    /// to it. Used for surfaces of emitters such as lens disks.
    ///
    /// * `p` - Position.
    /// * `n` - Unit normal.
    pub fn with_normal(p: Vector3f, n: Vector3f) -> Self {
        Self::new(p, n, n, Vector2f::zero())
    }

    /// Recompute `ss` and `st` from `sn`.
    pub fn compute_tangent_space(&mut self) {
        let (ss, st) = orthonormal_basis(&self.sn);
        self.ss = ss;
        self.st = st;
    }

    /// Returns the shading frame.
    pub fn shading_frame(&self) -> Frame {
        Frame {
            s: self.ss,
            t: self.st,
            n: self.sn,
        }
    }

    /// Convert a world direction into shading coordinates.
    ///
    /// * `w` - The direction.
    #[inline(always)]
    pub fn to_shading(&self, w: &Vector3f) -> Vector3f {
        Vector3f::new(w.dot(&self.ss), w.dot(&self.st), w.dot(&self.sn))
    }

    /// Convert a direction in shading coordinates into world space.
    ///
    /// * `w` - The direction.
    #[inline(always)]
    pub fn to_world(&self, w: &Vector3f) -> Vector3f {
        self.ss * w.x + self.st * w.y + self.sn * w.z
    }

    /// Returns |w·gn| or 1 if the point is degenerate.
    ///
    /// * `w` - The direction.
    #[inline(always)]
    pub fn abs_cos_geometric(&self, w: &Vector3f) -> Float {
        if self.degenerated {
            1.0
        } else {
            w.abs_dot(&self.gn)
        }
    }

    /// Returns |w·sn| or 1 if the point is degenerate.
    ///
    /// * `w` - The direction.
    #[inline(always)]
    pub fn abs_cos_shading(&self, w: &Vector3f) -> Float {
        if self.degenerated {
            1.0
        } else {
            w.abs_dot(&self.sn)
        }
    }
}

/// The generalized geometry term between two surface points. Cosines at
/// degenerate points are dropped. Returns 0 when the points are closer than
/// `EPS_LARGE`.
///
/// * `g1` - First point.
/// * `g2` - Second point.
pub fn generalized_geometry_term(g1: &SurfaceGeometry, g2: &SurfaceGeometry) -> Float {
    let v = g2.p - g1.p;
    let dist2 = v.length_squared();
    if dist2 < EPS_LARGE * EPS_LARGE {
        return 0.0;
    }
    let d = v / dist2.sqrt();
    g1.abs_cos_geometric(&d) * g2.abs_cos_geometric(&d) / dist2
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
