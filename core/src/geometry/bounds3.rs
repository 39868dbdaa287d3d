//! 3-D Axis Aligned Bounding Boxes.

use super::*;
use crate::lm::*;

/// 3-D axis aligned bounding box.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds3f {
    /// Minimum corner.
    pub p_min: Vector3f,

    /// Maximum corner.
    pub p_max: Vector3f,
}

impl Default for Bounds3f {
    /// Returns an empty bounding box.
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds3f {
    /// An empty bounding box. Any union with it yields the other operand.
    pub const EMPTY: Self = Self {
        p_min: Vector3f {
            x: INFINITY,
            y: INFINITY,
            z: INFINITY,
        },
        p_max: Vector3f {
            x: -INFINITY,
            y: -INFINITY,
            z: -INFINITY,
        },
    };

    /// Creates a bounding box enclosing two points.
    ///
    /// * `p1` - First point.
    /// * `p2` - Second point.
    pub fn new(p1: Vector3f, p2: Vector3f) -> Self {
        Self {
            p_min: p1.min(&p2),
            p_max: p1.max(&p2),
        }
    }

    /// Returns `true` if the box contains no point.
    pub fn is_empty(&self) -> bool {
        self.p_min.x > self.p_max.x || self.p_min.y > self.p_max.y || self.p_min.z > self.p_max.z
    }

    /// Returns the vector from the minimum to the maximum corner.
    pub fn diagonal(&self) -> Vector3f {
        self.p_max - self.p_min
    }

    /// Returns the center of the box.
    pub fn centroid(&self) -> Vector3f {
        0.5 * (self.p_min + self.p_max)
    }

    /// Returns the surface area of the box, zero for an empty box.
    pub fn surface_area(&self) -> Float {
        if self.is_empty() {
            0.0
        } else {
            let d = self.diagonal();
            2.0 * (d.x * d.y + d.x * d.z + d.y * d.z)
        }
    }

    /// Returns the axis with the largest extent.
    pub fn longest_axis(&self) -> Axis {
        self.diagonal().max_dimension()
    }

    /// Returns the position of a point relative to the corners of the box,
    /// where the minimum corner is (0, 0, 0) and the maximum corner is
    /// (1, 1, 1). Degenerate axes map to 0.
    ///
    /// * `p` - The point.
    pub fn offset(&self, p: &Vector3f) -> Vector3f {
        let mut o = *p - self.p_min;
        for axis in Axis::ALL {
            let extent = self.p_max[axis] - self.p_min[axis];
            o[axis] = if extent > 0.0 { o[axis] / extent } else { 0.0 };
        }
        o
    }

    /// Returns `true` if the point lies inside or on the box.
    ///
    /// * `p` - The point.
    pub fn contains(&self, p: &Vector3f) -> bool {
        p.x >= self.p_min.x
            && p.x <= self.p_max.x
            && p.y >= self.p_min.y
            && p.y <= self.p_max.y
            && p.z >= self.p_min.z
            && p.z <= self.p_max.z
    }

    /// Returns the center and radius of a sphere enclosing the box. An empty
    /// box yields a zero sphere at the origin.
    pub fn bounding_sphere(&self) -> (Vector3f, Float) {
        if self.is_empty() {
            (Vector3f::ZERO, 0.0)
        } else {
            let center = self.centroid();
            (center, center.distance(&self.p_max))
        }
    }

    /// Slab test. Returns the parametric range of the ray that overlaps the
    /// box, clipped to the ray's own range.
    ///
    /// * `ray` - The ray.
    pub fn intersect_p(&self, ray: &Ray) -> Option<(Float, Float)> {
        let mut t0 = ray.min_t;
        let mut t1 = ray.max_t;
        for axis in Axis::ALL {
            let inv_d = 1.0 / ray.d[axis];
            let mut t_near = (self.p_min[axis] - ray.o[axis]) * inv_d;
            let mut t_far = (self.p_max[axis] - ray.o[axis]) * inv_d;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }

            // Account for rounding in the slab distances.
            t_far *= 1.0 + 2.0 * gamma(3);
            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }

    /// Slab test with a precomputed reciprocal direction. Returns `true` if
    /// the ray overlaps the box within its range.
    ///
    /// * `ray`        - The ray.
    /// * `inv_dir`    - Reciprocal of the ray direction.
    /// * `dir_is_neg` - 1 for each negative component of the direction.
    pub fn intersect_p_inv(&self, ray: &Ray, inv_dir: &Vector3f, dir_is_neg: [usize; 3]) -> bool {
        let bounds = [&self.p_min, &self.p_max];

        // Check for ray intersection against x and y slabs.
        let mut t_min = (bounds[dir_is_neg[0]].x - ray.o.x) * inv_dir.x;
        let mut t_max = (bounds[1 - dir_is_neg[0]].x - ray.o.x) * inv_dir.x;
        let ty_min = (bounds[dir_is_neg[1]].y - ray.o.y) * inv_dir.y;
        let ty_max = (bounds[1 - dir_is_neg[1]].y - ray.o.y) * inv_dir.y * (1.0 + 2.0 * gamma(3));
        t_max *= 1.0 + 2.0 * gamma(3);

        if t_min > ty_max || ty_min > t_max {
            return false;
        }
        if ty_min > t_min {
            t_min = ty_min;
        }
        if ty_max < t_max {
            t_max = ty_max;
        }

        // Check for ray intersection against z slab.
        let tz_min = (bounds[dir_is_neg[2]].z - ray.o.z) * inv_dir.z;
        let tz_max = (bounds[1 - dir_is_neg[2]].z - ray.o.z) * inv_dir.z * (1.0 + 2.0 * gamma(3));
        if t_min > tz_max || tz_min > t_max {
            return false;
        }
        if tz_min > t_min {
            t_min = tz_min;
        }
        if tz_max < t_max {
            t_max = tz_max;
        }

        t_min <= ray.max_t && t_max >= ray.min_t
    }
}

impl Union<Bounds3f> for Bounds3f {
    /// Return the smallest box enclosing both boxes.
    ///
    /// * `other` - The other box.
    fn union(&self, other: &Bounds3f) -> Self {
        Self {
            p_min: self.p_min.min(&other.p_min),
            p_max: self.p_max.max(&other.p_max),
        }
    }
}

impl Union<Vector3f> for Bounds3f {
    /// Return the smallest box enclosing the box and a point.
    ///
    /// * `p` - The point.
    fn union(&self, p: &Vector3f) -> Self {
        Self {
            p_min: self.p_min.min(p),
            p_max: self.p_max.max(p),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
