//! Four-wide Ray-Box Test

use super::QbvhNode;
use core::geometry::*;
use core::lm::*;

/// Widens the far slab distance to cover rounding in single precision.
const T_FAR_SCALE: f32 = 1.0 + 4.0 * f32::EPSILON;

/// A ray prepared for testing against the four child boxes of a node.
#[derive(Copy, Clone, Debug)]
pub struct RayQuad {
    /// Origin.
    pub o: [f32; 3],

    /// Reciprocal direction.
    pub inv_dir: [f32; 3],

    /// 1 for each negative direction component.
    pub dir_is_neg: [usize; 3],

    /// Minimum ray parameter.
    pub t_min: f32,
}

impl RayQuad {
    /// Prepare a ray.
    ///
    /// * `ray` - The ray.
    pub fn new(ray: &Ray) -> Self {
        let inv = [1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z];
        Self {
            o: [ray.o.x as f32, ray.o.y as f32, ray.o.z as f32],
            inv_dir: [inv[0] as f32, inv[1] as f32, inv[2] as f32],
            dir_is_neg: [(inv[0] < 0.0) as usize, (inv[1] < 0.0) as usize, (inv[2] < 0.0) as usize],
            t_min: f32_round_down(ray.min_t),
        }
    }
}

/// Test a ray against the four child boxes of a node. Returns a bit mask of
/// the children that overlap `[t_min, t_max]` and the entry distance of each.
///
/// * `node`  - The node.
/// * `ray`   - The prepared ray.
/// * `t_max` - Current maximum ray parameter.
#[cfg(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2"))]
#[inline]
pub fn intersect_boxes(node: &QbvhNode, ray: &RayQuad, t_max: f32) -> (u32, [f32; 4]) {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::*;
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::*;

    let mut near = [0.0_f32; 4];

    // SAFETY: SSE2 is enabled at compile time and every row of
    // `QbvhNode::bounds` starts on a 16-byte boundary.
    let mask = unsafe {
        let mut t0 = _mm_set1_ps(ray.t_min);
        let mut t1 = _mm_set1_ps(t_max);
        let scale = _mm_set1_ps(T_FAR_SCALE);
        for axis in 0..3 {
            let neg = ray.dir_is_neg[axis];
            let lo = _mm_load_ps(node.bounds[axis + 3 * neg].as_ptr());
            let hi = _mm_load_ps(node.bounds[axis + 3 * (1 - neg)].as_ptr());
            let o = _mm_set1_ps(ray.o[axis]);
            let inv = _mm_set1_ps(ray.inv_dir[axis]);

            let t_near = _mm_mul_ps(_mm_sub_ps(lo, o), inv);
            let t_far = _mm_mul_ps(_mm_mul_ps(_mm_sub_ps(hi, o), inv), scale);

            // NaN slab distances leave the running interval unchanged.
            t0 = _mm_max_ps(t_near, t0);
            t1 = _mm_min_ps(t_far, t1);
        }
        _mm_storeu_ps(near.as_mut_ptr(), t0);
        _mm_movemask_ps(_mm_cmple_ps(t0, t1)) as u32
    };

    (mask, near)
}

/// Test a ray against the four child boxes of a node. Returns a bit mask of
/// the children that overlap `[t_min, t_max]` and the entry distance of each.
///
/// * `node`  - The node.
/// * `ray`   - The prepared ray.
/// * `t_max` - Current maximum ray parameter.
#[cfg(not(all(any(target_arch = "x86", target_arch = "x86_64"), target_feature = "sse2")))]
#[inline]
pub fn intersect_boxes(node: &QbvhNode, ray: &RayQuad, t_max: f32) -> (u32, [f32; 4]) {
    let mut near = [0.0_f32; 4];
    let mut mask = 0_u32;
    for (lane, t_entry) in near.iter_mut().enumerate() {
        let mut t0 = ray.t_min;
        let mut t1 = t_max;
        for axis in 0..3 {
            let neg = ray.dir_is_neg[axis];
            let lo = node.bounds[axis + 3 * neg][lane];
            let hi = node.bounds[axis + 3 * (1 - neg)][lane];
            let t_near = (lo - ray.o[axis]) * ray.inv_dir[axis];
            let t_far = (hi - ray.o[axis]) * ray.inv_dir[axis] * T_FAR_SCALE;
            if t_near > t0 {
                t0 = t_near;
            }
            if t_far < t1 {
                t1 = t_far;
            }
        }
        if t0 <= t1 {
            mask |= 1 << lane;
        }
        *t_entry = t0;
    }
    (mask, near)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qbvh::QbvhChild;

    fn node_with_unit_boxes() -> QbvhNode {
        let mut node = QbvhNode::empty();
        // Lane i holds the unit cube translated by 2i along x; lane 3 is empty.
        for lane in 0..3 {
            let min = Vector3f::new(2.0 * lane as Float, 0.0, 0.0);
            let b = Bounds3f::new(min, min + Vector3f::splat(1.0));
            node.set_child(lane, &b, QbvhChild::Node(lane as u32));
        }
        node
    }

    #[test]
    fn ray_along_x_hits_all_boxes() {
        let node = node_with_unit_boxes();
        let ray = RayQuad::new(&Ray::new(Vector3f::new(-1.0, 0.5, 0.5), Vector3f::X));
        let (mask, near) = intersect_boxes(&node, &ray, f32::INFINITY);
        assert_eq!(mask, 0b0111);
        assert!((near[0] - 1.0).abs() < 1e-5);
        assert!((near[1] - 3.0).abs() < 1e-5);
        assert!((near[2] - 5.0).abs() < 1e-5);
    }

    #[test]
    fn range_culls_far_boxes() {
        let node = node_with_unit_boxes();
        let ray = RayQuad::new(&Ray::new(Vector3f::new(-1.0, 0.5, 0.5), Vector3f::X));
        let (mask, _) = intersect_boxes(&node, &ray, 2.5);
        assert_eq!(mask, 0b0001);
    }

    #[test]
    fn axis_parallel_ray_outside_slab_misses() {
        let node = node_with_unit_boxes();
        let ray = RayQuad::new(&Ray::new(Vector3f::new(2.5, 5.0, 0.5), -Vector3f::Y));
        let (mask, _) = intersect_boxes(&node, &ray, f32::INFINITY);
        assert_eq!(mask, 0b0010);

        let ray = RayQuad::new(&Ray::new(Vector3f::new(1.5, 5.0, 0.5), -Vector3f::Y));
        let (mask, _) = intersect_boxes(&node, &ray, f32::INFINITY);
        assert_eq!(mask, 0);
    }
}
