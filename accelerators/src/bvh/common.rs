//! BVH Common

use core::geometry::*;
use core::lm::*;
use core::{stat_counter, stat_inc, stat_memory_counter, stat_ratio, stat_register_fns};
use shared_arena::ArenaArc;

stat_memory_counter!("Memory/BVH tree", TREE_BYTES, bvh_stats_tree_bytes);
stat_ratio!(
    "BVH/Triangles per leaf node",
    TOTAL_PRIMITIVES,
    TOTAL_LEAF_NODES,
    bvh_stats_prims_per_leaf_node,
);
stat_counter!("BVH/Interior nodes", INTERIOR_NODES, bvh_stats_interior_nodes);
stat_counter!("BVH/Leaf nodes", LEAF_NODES, bvh_stats_leaf_nodes);

stat_register_fns!(
    bvh_stats_tree_bytes,
    bvh_stats_prims_per_leaf_node,
    bvh_stats_interior_nodes,
    bvh_stats_leaf_nodes,
);

/// Record the memory used by a flattened hierarchy.
///
/// * `bytes` - Size in bytes.
pub(crate) fn report_tree_bytes(bytes: usize) {
    register_stats();
    stat_inc!(TREE_BYTES, bytes as u64);
}

/// SAH bucket information.
#[derive(Copy, Clone, Debug)]
pub struct BucketInfo {
    /// Count of triangles.
    pub count: usize,

    /// Bounding box for the bucket.
    pub bounds: Bounds3f,
}

impl Default for BucketInfo {
    /// Returns an empty bucket.
    fn default() -> Self {
        Self {
            count: 0,
            bounds: Bounds3f::EMPTY,
        }
    }
}

/// Stores information about a triangle during the build.
#[derive(Copy, Clone, Debug)]
pub struct TriangleInfo {
    /// Index into the triangle list.
    pub triangle_number: usize,

    /// The bounding box of the triangle.
    pub bounds: Bounds3f,

    /// The centroid of the triangle.
    pub centroid: Vector3f,
}

impl TriangleInfo {
    /// Create a `TriangleInfo`.
    ///
    /// * `triangle_number` - Index into the triangle list.
    /// * `bounds`          - The bounding box of the triangle.
    /// * `centroid`        - The centroid of the triangle.
    pub fn new(triangle_number: usize, bounds: Bounds3f, centroid: Vector3f) -> Self {
        Self {
            triangle_number,
            bounds,
            centroid,
        }
    }
}

/// BVHBuildNode represents a node of the binary hierarchy during the build.
#[derive(Clone)]
pub struct BVHBuildNode {
    /// Bounding box of all children beneath this node.
    pub bounds: Bounds3f,

    /// Children of this node.
    pub children: [Option<ArenaArc<BVHBuildNode>>; 2],

    /// Coordinate axis along which triangles are partitioned between the
    /// two children.
    pub split_axis: Axis,

    /// Index of the first triangle in the ordered triangle list.
    pub first_prim_offset: usize,

    /// Number of triangles in a leaf; 0 for interior nodes.
    pub n_primitives: usize,
}

impl Default for BVHBuildNode {
    fn default() -> Self {
        Self {
            bounds: Bounds3f::EMPTY,
            children: [None, None],
            split_axis: Axis::default(),
            first_prim_offset: 0,
            n_primitives: 0,
        }
    }
}

impl BVHBuildNode {
    /// Create a leaf node.
    ///
    /// * `first`  - Index of the first triangle in the ordered list.
    /// * `n`      - Number of triangles.
    /// * `bounds` - Bounding box.
    pub fn new_leaf_node(first: usize, n: usize, bounds: Bounds3f) -> Self {
        stat_inc!(LEAF_NODES, 1);
        stat_inc!(TOTAL_LEAF_NODES, 1);
        stat_inc!(TOTAL_PRIMITIVES, n as i64);
        Self {
            first_prim_offset: first,
            n_primitives: n,
            bounds,
            children: [None, None],
            split_axis: Axis::default(),
        }
    }

    /// Create an interior node.
    ///
    /// * `axis` - Axis used for partitioning children.
    /// * `c0`   - First child.
    /// * `c1`   - Second child.
    pub fn new_interior_node(axis: Axis, c0: ArenaArc<BVHBuildNode>, c1: ArenaArc<BVHBuildNode>) -> Self {
        stat_inc!(INTERIOR_NODES, 1);
        Self {
            first_prim_offset: 0,
            n_primitives: 0,
            bounds: c0.bounds.union(&c1.bounds),
            children: [Some(c0), Some(c1)],
            split_axis: axis,
        }
    }

    /// Returns `true` for leaf nodes.
    pub fn is_leaf(&self) -> bool {
        self.n_primitives > 0 || self.children[0].is_none()
    }
}

/// Stores information needed to traverse the binary hierarchy.
#[derive(Copy, Clone, Debug)]
pub struct LinearBVHNode {
    /// Bounding box for the node.
    pub bounds: Bounds3f,

    /// For leaf nodes, offset of the first triangle. For interior nodes,
    /// offset to the second child.
    pub offset: u32,

    /// For leaf nodes, the number of triangles. For interior nodes, 0.
    pub n_primitives: u16,

    /// For interior nodes, which coordinate axis was used for partitioning.
    pub axis: u8,

    /// Padding.
    pub pad: u8,
}

impl Default for LinearBVHNode {
    fn default() -> Self {
        Self {
            bounds: Bounds3f::EMPTY,
            offset: 0,
            n_primitives: 0,
            axis: 0,
            pad: 0,
        }
    }
}

impl LinearBVHNode {
    /// Creates a leaf node.
    ///
    /// * `bounds`       - Bounding box for the node.
    /// * `offset`       - Offset of the first triangle.
    /// * `n_primitives` - Number of triangles.
    pub fn new_leaf_node(bounds: Bounds3f, offset: u32, n_primitives: u16) -> Self {
        Self {
            bounds,
            offset,
            n_primitives,
            axis: 0,
            pad: 0,
        }
    }

    /// Creates an interior node.
    ///
    /// * `bounds` - Bounding box for the node.
    /// * `offset` - Offset to the second child.
    /// * `axis`   - Axis used for partitioning.
    pub fn new_interior_node(bounds: Bounds3f, offset: u32, axis: u8) -> Self {
        Self {
            bounds,
            offset,
            axis,
            n_primitives: 0,
            pad: 0,
        }
    }
}

/// Reciprocal direction and per-axis sign of a ray for slab tests.
///
/// * `ray` - The ray.
#[inline]
pub fn ray_inverse(ray: &Ray) -> (Vector3f, [usize; 3]) {
    let inv_dir = Vector3f::new(1.0 / ray.d.x, 1.0 / ray.d.y, 1.0 / ray.d.z);
    let dir_is_neg = [
        (inv_dir.x < 0.0) as usize,
        (inv_dir.y < 0.0) as usize,
        (inv_dir.z < 0.0) as usize,
    ];
    (inv_dir, dir_is_neg)
}

/// Cost of traversing an interior node.
pub(crate) const TRAVERSAL_COST: Float = 1.0;

/// Cost of intersecting one triangle.
pub(crate) const INTERSECTION_COST: Float = 1.0;
