//! Bounding Volume Hierarchy.

use crate::triaccel::*;
use core::accelerator::*;
use core::error::*;
use core::geometry::*;
use core::paramset::*;
use core::primitive::*;
use core::registry::*;

mod common;
mod sah;

pub use common::*;
pub use sah::N_BUCKETS;
use shared_arena::{ArenaArc, SharedArena};

/// Default maximum number of triangles in a leaf.
pub const DEFAULT_MAX_PRIMS_IN_NODE: usize = 4;

/// The result of a binary SAH build.
pub struct BinaryTree {
    /// Root node; `None` when there are no triangles.
    pub root: Option<ArenaArc<BVHBuildNode>>,

    /// Triangle test records ordered so that leaves are contiguous.
    pub triangles: Vec<TriAccel>,

    /// Number of build nodes.
    pub total_nodes: usize,
}

/// Build the binary SAH hierarchy over the triangles of all primitives.
/// Shared by `BvhAccel` and `Qbvh`.
///
/// * `arena`             - Allocator for build nodes.
/// * `primitives`        - The primitives.
/// * `max_prims_in_node` - Maximum number of triangles in a leaf.
pub fn build_binary_tree(
    arena: &SharedArena<BVHBuildNode>,
    primitives: &[Primitive],
    max_prims_in_node: usize,
) -> BinaryTree {
    register_stats();

    let triangles: Vec<SceneTriangle> = collect_triangles(primitives);
    let accels: Vec<(SceneTriangle, TriAccel)> = triangles
        .into_iter()
        .filter_map(|t| TriAccel::new(&t).map(|a| (t, a)))
        .collect();

    if accels.is_empty() {
        return BinaryTree {
            root: None,
            triangles: vec![],
            total_nodes: 0,
        };
    }

    let mut triangle_info: Vec<TriangleInfo> = accels
        .iter()
        .enumerate()
        .map(|(i, (t, _))| TriangleInfo::new(i, t.bounds(), t.centroid()))
        .collect();

    let n = triangle_info.len();
    let mut total_nodes = 0;
    let mut ordered = Vec::with_capacity(n);
    let root = sah::build(
        arena,
        max_prims_in_node,
        &mut triangle_info,
        0,
        n,
        &mut total_nodes,
        &mut ordered,
    );

    BinaryTree {
        root: Some(root),
        triangles: ordered.into_iter().map(|i| accels[i].1).collect(),
        total_nodes,
    }
}

/// Binary Bounding Volume Hierarchy Accelerator.
#[derive(Clone, Debug)]
pub struct BvhAccel {
    /// Maximum number of triangles in a leaf.
    pub max_prims_in_node: usize,

    /// Triangle test records in leaf order.
    triangles: Vec<TriAccel>,

    /// The list of nodes.
    nodes: Vec<LinearBVHNode>,
}

impl BvhAccel {
    /// Create an unbuilt hierarchy.
    ///
    /// * `max_prims_in_node` - Maximum number of triangles in a leaf.
    pub fn new(max_prims_in_node: usize) -> Self {
        Self {
            max_prims_in_node,
            triangles: vec![],
            nodes: vec![],
        }
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Flatten the tree to the linear representation.
    ///
    /// * `node`   - The node.
    /// * `nodes`  - The linear nodes.
    /// * `offset` - Tracks current offset into `nodes`.
    fn flatten_bvh_tree(node: &ArenaArc<BVHBuildNode>, nodes: &mut Vec<LinearBVHNode>, offset: &mut u32) -> u32 {
        let my_offset = *offset;
        *offset += 1;

        if node.is_leaf() {
            nodes[my_offset as usize] =
                LinearBVHNode::new_leaf_node(node.bounds, node.first_prim_offset as u32, node.n_primitives as u16);
        } else {
            if let Some(child) = node.children[0].as_ref() {
                // The first child immediately follows its parent.
                Self::flatten_bvh_tree(child, nodes, offset);
            }
            if let Some(child) = node.children[1].as_ref() {
                let second_child_offset = Self::flatten_bvh_tree(child, nodes, offset);
                nodes[my_offset as usize] =
                    LinearBVHNode::new_interior_node(node.bounds, second_child_offset, node.split_axis.into());
            }
        }

        my_offset
    }
}

impl Default for BvhAccel {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PRIMS_IN_NODE)
    }
}

impl Accelerator for BvhAccel {
    fn build(&mut self, primitives: &[Primitive]) -> Result<()> {
        let arena = SharedArena::<BVHBuildNode>::with_capacity(1024);
        let tree = build_binary_tree(&arena, primitives, self.max_prims_in_node);

        self.triangles = tree.triangles;
        self.nodes = vec![LinearBVHNode::default(); tree.total_nodes];
        if let Some(root) = tree.root.as_ref() {
            let mut offset = 0_u32;
            Self::flatten_bvh_tree(root, &mut self.nodes, &mut offset);
            debug_assert!(tree.total_nodes == offset as usize);
        }

        let tree_bytes = self.nodes.len() * std::mem::size_of::<LinearBVHNode>()
            + self.triangles.len() * std::mem::size_of::<TriAccel>();
        report_tree_bytes(tree_bytes);
        info!(
            "BVH created with {} nodes for {} triangles ({:.2} MB)",
            self.nodes.len(),
            self.triangles.len(),
            tree_bytes as f32 / (1024.0 * 1024.0)
        );
        Ok(())
    }

    fn intersect(&self, ray: &mut Ray) -> Option<TriangleHit> {
        let mut result = None;
        if self.nodes.is_empty() {
            return result;
        }

        let (inv_dir, dir_is_neg) = ray_inverse(ray);

        // Follow ray through BVH nodes to find triangle intersections.
        let (mut to_visit_offset, mut current_node_index) = (0, 0);
        let mut nodes_to_visit = [0_usize; 64];

        loop {
            let node = &self.nodes[current_node_index];
            if node.bounds.intersect_p_inv(ray, &inv_dir, dir_is_neg) {
                if node.n_primitives > 0 {
                    // Intersect ray with triangles in leaf node.
                    let first = node.offset as usize;
                    for tri in self.triangles[first..first + node.n_primitives as usize].iter() {
                        if let Some(hit) = tri.hit(ray) {
                            ray.max_t = hit.t;
                            result = Some(hit);
                        }
                    }
                    if to_visit_offset == 0 {
                        break;
                    }
                    to_visit_offset -= 1;
                    current_node_index = nodes_to_visit[to_visit_offset];
                } else if dir_is_neg[node.axis as usize] == 1 {
                    // Put far node on the stack, advance to near node.
                    nodes_to_visit[to_visit_offset] = current_node_index + 1;
                    to_visit_offset += 1;
                    current_node_index = node.offset as usize;
                } else {
                    nodes_to_visit[to_visit_offset] = node.offset as usize;
                    to_visit_offset += 1;
                    current_node_index += 1;
                }
            } else {
                if to_visit_offset == 0 {
                    break;
                }
                to_visit_offset -= 1;
                current_node_index = nodes_to_visit[to_visit_offset];
            }
        }
        result
    }
}

/// Create a binary BVH from parameters.
///
/// * `params`    - Parameter set; `maxnodeprims` sets the leaf size.
/// * `_registry` - Unused.
pub fn create_bvh_accel(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Accelerator>> {
    let max_prims_in_node = params.find_one_int("maxnodeprims", DEFAULT_MAX_PRIMS_IN_NODE as i32);
    if !(1..=255).contains(&max_prims_in_node) {
        return Err(Error::config(format!(
            "'maxnodeprims' must be in [1, 255], got {}",
            max_prims_in_node
        )));
    }
    Ok(Box::new(BvhAccel::new(max_prims_in_node as usize)))
}
