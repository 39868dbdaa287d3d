//! Triangle Accelerator

use core::accelerator::*;
use core::geometry::*;
use core::lm::*;

/// Maps the dominant axis `k` to the two projection axes `u = (k + 1) % 3`
/// and `v = (k + 2) % 3`.
const MODULO: [usize; 4] = [1, 2, 0, 1];

/// Precomputed ray-triangle test after Wald. The triangle is projected onto
/// the plane orthogonal to the dominant axis of its normal; the record keeps
/// the projected plane equation and the two edge equations.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct TriAccel {
    /// Dominant axis of the normal.
    pub k: usize,

    /// Plane equation `n_u`, `n_v` and `n_d` normalized by `n_k`.
    pub n_u: Float,
    pub n_v: Float,
    pub n_d: Float,

    /// Projected first vertex.
    pub a_u: Float,
    pub a_v: Float,

    /// First edge equation.
    pub b_nu: Float,
    pub b_nv: Float,

    /// Second edge equation.
    pub c_nu: Float,
    pub c_nv: Float,

    /// Index of the primitive.
    pub primitive: usize,

    /// Index of the triangle in the primitive's mesh.
    pub face: usize,
}

impl TriAccel {
    /// Precompute the test for a triangle. Returns `None` if the projected
    /// triangle is degenerate.
    ///
    /// * `triangle` - The triangle.
    pub fn new(triangle: &SceneTriangle) -> Option<Self> {
        let [a, b, c] = triangle.p;
        let c_edge = b - a;
        let b_edge = c - a;
        let n = c_edge.cross(&b_edge);

        let k: usize = n.abs().max_dimension().into();
        let u = MODULO[k];
        let v = MODULO[k + 1];

        let denom = b_edge[u] * c_edge[v] - b_edge[v] * c_edge[u];
        if denom == 0.0 || n[k] == 0.0 {
            return None;
        }

        let inv_nk = 1.0 / n[k];
        Some(Self {
            k,
            n_u: n[u] * inv_nk,
            n_v: n[v] * inv_nk,
            n_d: a.dot(&n) * inv_nk,
            a_u: a[u],
            a_v: a[v],
            b_nu: b_edge[u] / denom,
            b_nv: -b_edge[v] / denom,
            c_nu: c_edge[v] / denom,
            c_nv: -c_edge[u] / denom,
            primitive: triangle.primitive,
            face: triangle.face,
        })
    }

    /// Intersect a ray with the triangle within `[ray.min_t, ray.max_t]`.
    /// Returns the ray parameter and the barycentric coordinates of vertices
    /// 1 and 2. The ray is not modified.
    ///
    /// * `ray` - The ray.
    #[inline]
    pub fn intersect(&self, ray: &Ray) -> Option<(Float, Vector2f)> {
        let k = self.k;
        let u = MODULO[k];
        let v = MODULO[k + 1];

        let dn = ray.d[u] * self.n_u + ray.d[v] * self.n_v + ray.d[k];
        if dn == 0.0 {
            return None;
        }
        let t = (self.n_d - ray.o[u] * self.n_u - ray.o[v] * self.n_v - ray.o[k]) / dn;
        if !(t >= ray.min_t && t <= ray.max_t) {
            return None;
        }

        let hu = ray.o[u] + t * ray.d[u] - self.a_u;
        let hv = ray.o[v] + t * ray.d[v] - self.a_v;

        let beta = hv * self.b_nu + hu * self.b_nv;
        if beta < 0.0 {
            return None;
        }
        let gamma = hu * self.c_nu + hv * self.c_nv;
        if gamma < 0.0 || beta + gamma > 1.0 {
            return None;
        }

        Some((t, Vector2f::new(beta, gamma)))
    }

    /// Intersect and convert the result into a `TriangleHit`.
    ///
    /// * `ray` - The ray.
    #[inline]
    pub fn hit(&self, ray: &Ray) -> Option<TriangleHit> {
        self.intersect(ray).map(|(t, b)| TriangleHit {
            primitive: self.primitive,
            face: self.face,
            b,
            t,
        })
    }
}

/// Build the test records for a set of triangles, dropping those whose
/// projection is degenerate.
///
/// * `triangles` - The triangles.
pub fn build_tri_accels(triangles: &[SceneTriangle]) -> Vec<TriAccel> {
    triangles.iter().filter_map(TriAccel::new).collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn unit_triangle() -> SceneTriangle {
        SceneTriangle {
            p: [Vector3f::ZERO, Vector3f::X, Vector3f::Y],
            primitive: 3,
            face: 7,
        }
    }

    #[test]
    fn ray_hits_triangle_center() {
        let accel = TriAccel::new(&unit_triangle()).unwrap();
        let ray = Ray::new(Vector3f::new(0.5, 0.5, 1.0), Vector3f::new(0.0, 0.0, -1.0));
        let hit = accel.hit(&ray).unwrap();
        assert!(approx_eq!(f64, hit.t, 1.0, ulps = 2));
        assert!(approx_eq!(f64, hit.b.x, 0.5, ulps = 2));
        assert!(approx_eq!(f64, hit.b.y, 0.5, ulps = 2));
        assert_eq!((hit.primitive, hit.face), (3, 7));
    }

    #[test]
    fn reversed_ray_misses() {
        let accel = TriAccel::new(&unit_triangle()).unwrap();
        let ray = Ray::new(Vector3f::new(0.5, 0.5, 1.0), Vector3f::Z);
        assert!(accel.intersect(&ray).is_none());
    }

    #[test]
    fn range_limits_are_honoured() {
        let accel = TriAccel::new(&unit_triangle()).unwrap();
        let o = Vector3f::new(0.25, 0.25, 1.0);
        let d = Vector3f::new(0.0, 0.0, -1.0);
        assert!(accel.intersect(&Ray::with_range(o, d, 0.0, 0.5)).is_none());
        assert!(accel.intersect(&Ray::with_range(o, d, 1.5, 3.0)).is_none());
        assert!(accel.intersect(&Ray::with_range(o, d, 0.0, 1.0)).is_some());
    }

    #[test]
    fn outside_points_miss() {
        let accel = TriAccel::new(&unit_triangle()).unwrap();
        let d = Vector3f::new(0.0, 0.0, -1.0);
        assert!(accel.intersect(&Ray::new(Vector3f::new(0.6, 0.6, 1.0), d)).is_none());
        assert!(accel.intersect(&Ray::new(Vector3f::new(-0.1, 0.5, 1.0), d)).is_none());
    }

    #[test]
    fn degenerate_triangle_is_rejected() {
        let t = SceneTriangle {
            p: [Vector3f::ZERO, Vector3f::X, Vector3f::new(2.0, 0.0, 0.0)],
            primitive: 0,
            face: 0,
        };
        assert!(TriAccel::new(&t).is_none());
    }

    prop_compose! {
        fn arb_point()(x in -10.0..10.0f64, y in -10.0..10.0f64, z in -10.0..10.0f64) -> Vector3f {
            Vector3f::new(x, y, z)
        }
    }

    proptest! {
        #[test]
        fn barycentrics_reconstruct_hit_point(
            a in arb_point(),
            b in arb_point(),
            c in arb_point(),
            u in 0.05..0.45f64,
            v in 0.05..0.45f64,
        ) {
            let tri = SceneTriangle { p: [a, b, c], primitive: 0, face: 0 };
            let n = (b - a).cross(&(c - a));
            prop_assume!(n.length() > 1e-2);

            let target = a * (1.0 - u - v) + b * u + c * v;
            let n = n.normalize();
            let o = target + n * 2.0;
            if let Some(accel) = TriAccel::new(&tri) {
                let ray = Ray::new(o, -n);
                let (t, bary) = accel.intersect(&ray).unwrap();
                prop_assert!(approx_eq!(f64, t, 2.0, epsilon = 1e-6));
                prop_assert!(approx_eq!(f64, bary.x, u, epsilon = 1e-6));
                prop_assert!(approx_eq!(f64, bary.y, v, epsilon = 1e-6));
            }
        }
    }
}
