//! Quad Bounding Volume Hierarchy.

use crate::bvh::{build_binary_tree, BVHBuildNode, DEFAULT_MAX_PRIMS_IN_NODE};
use crate::triaccel::*;
use core::accelerator::*;
use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;
use core::primitive::*;
use core::registry::*;
use core::{stat_counter, stat_inc, stat_ratio, stat_register_fns};
use shared_arena::{ArenaArc, SharedArena};

mod simd;

pub use simd::*;

stat_counter!("QBVH/Nodes", QBVH_NODES, qbvh_stats_nodes);
stat_counter!("QBVH/Leaves", QBVH_LEAVES, qbvh_stats_leaves);
stat_ratio!(
    "QBVH/Nodes visited per ray",
    NODES_VISITED,
    RAYS_TRAVERSED,
    qbvh_stats_nodes_visited,
);
stat_register_fns!(qbvh_stats_nodes, qbvh_stats_leaves, qbvh_stats_nodes_visited);

/// Maximum depth of the traversal stack.
const STACK_SIZE: usize = 256;

/// Deepest hierarchy the traversal stack can hold. Each level leaves at most
/// three siblings on the stack.
const MAX_DEPTH: usize = (STACK_SIZE - 1) / 3;

/// A child slot of a QBVH node.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum QbvhChild {
    /// Unused slot.
    #[default]
    Empty,

    /// Index of an inner node.
    Node(u32),

    /// A range of triangles.
    Leaf { offset: u32, count: u32 },
}

/// A four-wide node. Child boxes are stored as rows of four lanes so that a
/// ray is tested against all of them at once.
#[repr(C, align(16))]
#[derive(Copy, Clone, Debug)]
pub struct QbvhNode {
    /// Rows min_x, min_y, min_z, max_x, max_y, max_z; one lane per child.
    pub bounds: [[f32; 4]; 6],

    /// Children.
    pub children: [QbvhChild; 4],

    /// Split axes: between the two pairs, inside the first pair and inside
    /// the second pair.
    pub axes: [u8; 3],
}

impl QbvhNode {
    /// Returns a node whose four slots are empty. Empty boxes are inverted so
    /// no ray overlaps them.
    pub fn empty() -> Self {
        Self {
            bounds: [
                [f32::INFINITY; 4],
                [f32::INFINITY; 4],
                [f32::INFINITY; 4],
                [f32::NEG_INFINITY; 4],
                [f32::NEG_INFINITY; 4],
                [f32::NEG_INFINITY; 4],
            ],
            children: [QbvhChild::Empty; 4],
            axes: [0; 3],
        }
    }

    /// Store a child box rounded outward to single precision.
    ///
    /// * `lane`   - Slot index.
    /// * `bounds` - Bounding box of the child.
    /// * `child`  - The child.
    pub fn set_child(&mut self, lane: usize, bounds: &Bounds3f, child: QbvhChild) {
        let extent = bounds.diagonal().max_component();
        for axis in 0..3 {
            let lo = bounds.p_min[axis];
            let hi = bounds.p_max[axis];
            self.bounds[axis][lane] = f32_round_down(lo - (abs(lo) + extent) * BOX_PADDING);
            self.bounds[axis + 3][lane] = f32_round_up(hi + (abs(hi) + extent) * BOX_PADDING);
        }
        self.children[lane] = child;
    }
}

/// Relative widening of child boxes beyond single precision rounding.
const BOX_PADDING: Float = 1.0 / 4194304.0;

/// Four-wide Bounding Volume Hierarchy built by collapsing every second level
/// of the binary SAH hierarchy.
#[derive(Clone, Debug)]
pub struct Qbvh {
    /// Maximum number of triangles in a leaf.
    pub max_prims_in_node: usize,

    /// Triangle test records in leaf order.
    triangles: Vec<TriAccel>,

    /// Nodes; the root is at index 0.
    nodes: Vec<QbvhNode>,

    /// Number of node levels.
    depth: usize,
}

impl Qbvh {
    /// Create an unbuilt hierarchy.
    ///
    /// * `max_prims_in_node` - Maximum number of triangles in a leaf.
    pub fn new(max_prims_in_node: usize) -> Self {
        Self {
            max_prims_in_node,
            triangles: vec![],
            nodes: vec![],
            depth: 0,
        }
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Returns the number of node levels.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Collapse a binary interior node and its children into one QBVH node,
    /// recursing into the grandchildren. Returns the index of the new node
    /// and the depth of its subtree.
    ///
    /// * `node`  - Binary interior node.
    /// * `nodes` - Output nodes.
    fn collapse(node: &BVHBuildNode, nodes: &mut Vec<QbvhNode>) -> (u32, usize) {
        let index = nodes.len();
        nodes.push(QbvhNode::empty());
        stat_inc!(QBVH_NODES, 1);

        let mut qnode = QbvhNode::empty();
        qnode.axes[0] = node.split_axis.into();

        // Up to two grandchildren per side; a leaf child occupies one slot.
        let mut slots: [Option<&ArenaArc<BVHBuildNode>>; 4] = [None; 4];
        for (side, child) in node.children.iter().enumerate() {
            if let Some(child) = child.as_ref() {
                if child.is_leaf() {
                    slots[2 * side] = Some(child);
                } else {
                    qnode.axes[1 + side] = child.split_axis.into();
                    slots[2 * side] = child.children[0].as_ref();
                    slots[2 * side + 1] = child.children[1].as_ref();
                }
            }
        }

        let mut depth = 1;
        for (lane, slot) in slots.iter().enumerate() {
            if let Some(g) = slot {
                let child = if g.is_leaf() {
                    stat_inc!(QBVH_LEAVES, 1);
                    QbvhChild::Leaf {
                        offset: g.first_prim_offset as u32,
                        count: g.n_primitives as u32,
                    }
                } else {
                    let (child, child_depth) = Self::collapse(g, nodes);
                    depth = depth.max(child_depth + 1);
                    QbvhChild::Node(child)
                };
                qnode.set_child(lane, &g.bounds, child);
            }
        }

        nodes[index] = qnode;
        (index as u32, depth)
    }

    /// Returns the slot visiting order of a node, nearest first.
    ///
    /// * `node`       - The node.
    /// * `dir_is_neg` - 1 for each negative direction component.
    #[inline]
    fn visit_order(node: &QbvhNode, dir_is_neg: &[usize; 3]) -> [usize; 4] {
        let first = if dir_is_neg[node.axes[1] as usize] == 1 { [1, 0] } else { [0, 1] };
        let second = if dir_is_neg[node.axes[2] as usize] == 1 { [3, 2] } else { [2, 3] };
        if dir_is_neg[node.axes[0] as usize] == 1 {
            [second[0], second[1], first[0], first[1]]
        } else {
            [first[0], first[1], second[0], second[1]]
        }
    }

    /// Find the closest hit and count the nodes visited on the way. On a hit
    /// `ray.max_t` is set to the hit distance.
    ///
    /// * `ray` - The ray.
    pub fn intersect_counted(&self, ray: &mut Ray) -> (Option<TriangleHit>, usize) {
        let mut result = None;
        let mut visited = 0;
        if self.nodes.is_empty() {
            return (result, visited);
        }

        let quad = RayQuad::new(ray);
        let mut t_max = f32_round_up(ray.max_t);

        let mut stack = [(QbvhChild::Empty, 0.0_f32); STACK_SIZE];
        stack[0] = (QbvhChild::Node(0), quad.t_min);
        let mut top = 1;

        while top > 0 {
            top -= 1;
            let (child, t_near) = stack[top];
            if t_near > t_max {
                continue;
            }

            match child {
                QbvhChild::Empty => {}
                QbvhChild::Leaf { offset, count } => {
                    let first = offset as usize;
                    for tri in self.triangles[first..first + count as usize].iter() {
                        if let Some(hit) = tri.hit(ray) {
                            ray.max_t = hit.t;
                            t_max = f32_round_up(hit.t);
                            result = Some(hit);
                        }
                    }
                }
                QbvhChild::Node(index) => {
                    visited += 1;
                    let node = &self.nodes[index as usize];
                    let (mask, near) = intersect_boxes(node, &quad, t_max);
                    if mask == 0 {
                        continue;
                    }

                    // Push far children first so the nearest is popped next.
                    let order = Self::visit_order(node, &quad.dir_is_neg);
                    for &lane in order.iter().rev() {
                        if mask & (1 << lane) != 0 {
                            debug_assert!(top < STACK_SIZE);
                            stack[top] = (node.children[lane], near[lane]);
                            top += 1;
                        }
                    }
                }
            }
        }

        (result, visited)
    }
}

impl Default for Qbvh {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PRIMS_IN_NODE)
    }
}

impl Accelerator for Qbvh {
    fn build(&mut self, primitives: &[Primitive]) -> Result<()> {
        register_stats();

        let arena = SharedArena::<BVHBuildNode>::with_capacity(1024);
        let tree = build_binary_tree(&arena, primitives, self.max_prims_in_node);
        self.triangles = tree.triangles;
        self.nodes = vec![];
        self.depth = 0;

        if let Some(root) = tree.root.as_ref() {
            if root.is_leaf() {
                let mut node = QbvhNode::empty();
                node.set_child(
                    0,
                    &root.bounds,
                    QbvhChild::Leaf {
                        offset: root.first_prim_offset as u32,
                        count: root.n_primitives as u32,
                    },
                );
                self.nodes.push(node);
                self.depth = 1;
                stat_inc!(QBVH_NODES, 1);
                stat_inc!(QBVH_LEAVES, 1);
            } else {
                let (_, depth) = Self::collapse(root, &mut self.nodes);
                self.depth = depth;
            }
        }
        check_depth(self.depth)?;

        info!(
            "QBVH created with {} nodes for {} triangles ({:.2} MB)",
            self.nodes.len(),
            self.triangles.len(),
            (self.nodes.len() * std::mem::size_of::<QbvhNode>() + self.triangles.len() * std::mem::size_of::<TriAccel>())
                as f32
                / (1024.0 * 1024.0)
        );
        Ok(())
    }

    fn intersect(&self, ray: &mut Ray) -> Option<TriangleHit> {
        let (hit, visited) = self.intersect_counted(ray);
        stat_inc!(NODES_VISITED, visited as i64);
        stat_inc!(RAYS_TRAVERSED, 1);
        hit
    }
}

/// Returns an error when a hierarchy of `depth` levels could overflow the
/// traversal stack.
///
/// * `depth` - Number of node levels.
fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        Err(Error::Fatal(format!(
            "QBVH depth {} exceeds the traversal limit of {}",
            depth, MAX_DEPTH
        )))
    } else {
        Ok(())
    }
}

/// Create a QBVH from parameters.
///
/// * `params`    - Parameter set; `maxnodeprims` sets the leaf size.
/// * `_registry` - Unused.
pub fn create_qbvh(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Accelerator>> {
    let max_prims_in_node = params.find_one_int("maxnodeprims", DEFAULT_MAX_PRIMS_IN_NODE as i32);
    if !(1..=255).contains(&max_prims_in_node) {
        return Err(Error::config(format!(
            "'maxnodeprims' must be in [1, 255], got {}",
            max_prims_in_node
        )));
    }
    Ok(Box::new(Qbvh::new(max_prims_in_node as usize)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::BvhAccel;
    use crate::naive::NaiveAccel;
    use core::mesh::TriangleMesh;
    use core::rng::*;
    use std::sync::Arc;

    fn random_point(rng: &mut dyn Random, scale: Float) -> Vector3f {
        Vector3f::new(
            (rng.next_float() - 0.5) * scale,
            (rng.next_float() - 0.5) * scale,
            (rng.next_float() - 0.5) * scale,
        )
    }

    fn random_direction(rng: &mut dyn Random) -> Vector3f {
        let z = 1.0 - 2.0 * rng.next_float();
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = TWO_PI * rng.next_float();
        Vector3f::new(r * phi.cos(), r * phi.sin(), z)
    }

    /// Random triangles split over two primitives.
    fn random_scene(n: usize, rng: &mut dyn Random) -> Vec<Primitive> {
        (0..2)
            .map(|p| {
                let mut positions = vec![];
                let mut faces = vec![];
                for i in 0..n / 2 {
                    let c = random_point(rng, 10.0);
                    for _ in 0..3 {
                        positions.push(c + random_point(rng, 1.5));
                    }
                    let k = 3 * i as u32;
                    faces.push([k, k + 1, k + 2]);
                }
                let mut prim = Primitive::new(&format!("random{}", p), Transform::IDENTITY);
                prim.mesh = Some(Arc::new(TriangleMesh::new(positions, vec![], vec![], faces).unwrap()));
                prim
            })
            .collect()
    }

    /// Unit cubes centered on a grid with spacing 2.
    fn cube_grid(n: usize) -> Vec<Primitive> {
        let positions: Vec<Vector3f> = (0..8)
            .map(|i| {
                Vector3f::new(
                    if i & 1 == 0 { -0.5 } else { 0.5 },
                    if i & 2 == 0 { -0.5 } else { 0.5 },
                    if i & 4 == 0 { -0.5 } else { 0.5 },
                )
            })
            .collect();
        let quads: Vec<Vec<u32>> = vec![
            vec![0, 2, 3, 1],
            vec![4, 5, 7, 6],
            vec![0, 1, 5, 4],
            vec![2, 6, 7, 3],
            vec![0, 4, 6, 2],
            vec![1, 3, 7, 5],
        ];
        let mesh = Arc::new(TriangleMesh::from_polygons(positions, vec![], vec![], &quads).unwrap());

        let mut prims = vec![];
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    let center = Vector3f::new(2.0 * x as Float, 2.0 * y as Float, 2.0 * z as Float);
                    let mut prim = Primitive::new(&format!("cube{}", prims.len()), Transform::translate(&center));
                    prim.mesh = Some(Arc::clone(&mesh));
                    prims.push(prim);
                }
            }
        }
        prims
    }

    #[test]
    fn agrees_with_naive_on_random_triangles() {
        let mut rng = RngType::StandardMt.create(42);
        let prims = random_scene(1000, rng.as_mut());

        let mut naive = NaiveAccel::new();
        naive.build(&prims).unwrap();
        let mut qbvh = Qbvh::default();
        qbvh.build(&prims).unwrap();
        let mut bvh = BvhAccel::default();
        bvh.build(&prims).unwrap();
        assert_eq!(qbvh.triangle_count(), naive.len());
        assert!(qbvh.depth() > 1 && qbvh.depth() <= MAX_DEPTH);

        let mut hits = 0;
        for _ in 0..2000 {
            let o = random_point(rng.as_mut(), 16.0);
            let d = random_direction(rng.as_mut());

            let mut r1 = Ray::new(o, d);
            let mut r2 = Ray::new(o, d);
            let mut r3 = Ray::new(o, d);
            let expected = naive.intersect(&mut r1);
            let actual = qbvh.intersect(&mut r2);
            assert_eq!(expected, actual);
            assert_eq!(expected, bvh.intersect(&mut r3));
            assert_eq!(r1.max_t, r2.max_t);
            if expected.is_some() {
                hits += 1;
            }
        }
        assert!(hits > 100);
    }

    #[test]
    fn cube_grid_hits_expected_cube_cheaply() {
        let prims = cube_grid(10);
        let mut qbvh = Qbvh::default();
        qbvh.build(&prims).unwrap();
        assert_eq!(qbvh.triangle_count(), 12000);

        let mut rng = RngType::StandardMt.create(7);
        let rays = 1000;
        let mut total_visited = 0;
        for _ in 0..rays {
            let target = (rng.next_u32() % 1000) as usize;
            let (x, y, z) = (target / 100, (target / 10) % 10, target % 10);
            let center = Vector3f::new(2.0 * x as Float, 2.0 * y as Float, 2.0 * z as Float);

            // Start in the gap around the target cube and aim at its center.
            let d = random_direction(rng.as_mut());
            let mut ray = Ray::new(center + d * 0.9, -d);
            let (hit, visited) = qbvh.intersect_counted(&mut ray);
            let hit = hit.unwrap();
            assert_eq!(hit.primitive, target);
            assert!(hit.t > 0.0 && hit.t < 0.9);
            total_visited += visited;
        }
        assert!((total_visited as Float / rays as Float) < 30.0);
    }

    #[test]
    fn empty_scene_never_hits() {
        let mut qbvh = Qbvh::default();
        qbvh.build(&[]).unwrap();
        let mut ray = Ray::new(Vector3f::ZERO, Vector3f::Z);
        assert!(qbvh.intersect(&mut ray).is_none());
    }

    #[test]
    fn single_triangle_scene() {
        let mut prim = Primitive::new("tri", Transform::IDENTITY);
        prim.mesh = Some(Arc::new(
            TriangleMesh::new(vec![Vector3f::ZERO, Vector3f::X, Vector3f::Y], vec![], vec![], vec![[0, 1, 2]]).unwrap(),
        ));
        let mut qbvh = Qbvh::default();
        qbvh.build(&[prim]).unwrap();
        assert_eq!(qbvh.node_count(), 1);
        assert_eq!(qbvh.depth(), 1);

        let mut ray = Ray::new(Vector3f::new(0.25, 0.25, 1.0), -Vector3f::Z);
        let hit = qbvh.intersect(&mut ray).unwrap();
        assert_eq!(hit.t, 1.0);
        assert_eq!(ray.max_t, 1.0);
    }

    #[test]
    fn depth_is_bounded_by_the_traversal_stack() {
        assert!(check_depth(MAX_DEPTH).is_ok());
        assert!(matches!(check_depth(MAX_DEPTH + 1), Err(Error::Fatal(_))));
        // Root on the stack plus three siblings left behind per level.
        assert!(3 * MAX_DEPTH + 1 <= STACK_SIZE);
    }
}
