//! Surface Area Heuristic Algorithm

use super::common::*;
use core::geometry::*;
use core::lm::*;
use order_stat::kth_by;
use shared_arena::{ArenaArc, SharedArena};
use std::cmp::Ordering;

/// Number of centroid bins per axis.
pub const N_BUCKETS: usize = 16;

/// A chosen split: axis and the last bucket of the left side.
#[derive(Copy, Clone, Debug)]
struct Split {
    axis: Axis,
    bucket: usize,
    cost: Float,
}

/// Recursively build the binary hierarchy over `triangle_info[start..end]`.
///
/// * `arena`             - Allocator for build nodes.
/// * `max_prims_in_node` - Maximum number of triangles in a leaf.
/// * `triangle_info`     - Triangle information; reordered in place.
/// * `start`             - Starting index. For first call it should be 0.
/// * `end`               - Ending index + 1.
/// * `total_nodes`       - Used to return total number of nodes.
/// * `ordered`           - Receives triangle indices so that leaves occupy
///                         contiguous ranges.
pub fn build(
    arena: &SharedArena<BVHBuildNode>,
    max_prims_in_node: usize,
    triangle_info: &mut [TriangleInfo],
    start: usize,
    end: usize,
    total_nodes: &mut usize,
    ordered: &mut Vec<usize>,
) -> ArenaArc<BVHBuildNode> {
    *total_nodes += 1;

    // Compute bounds of all triangles in the node.
    let bounds = triangle_info[start..end]
        .iter()
        .fold(Bounds3f::EMPTY, |b, info| b.union(&info.bounds));
    let n_primitives = end - start;

    let split = if n_primitives == 1 {
        None
    } else {
        let centroid_bounds = triangle_info[start..end]
            .iter()
            .fold(Bounds3f::EMPTY, |b, info| b.union(&info.centroid));

        match split_sah(triangle_info, start, end, &centroid_bounds, &bounds, max_prims_in_node) {
            Some(result) => Some(result),
            None if n_primitives > max_prims_in_node => {
                // All centroids coincide; split by count along any axis.
                let dim = centroid_bounds.longest_axis();
                Some((split_equal_counts(triangle_info, start, end, dim), dim))
            }
            None => None,
        }
    };

    match split {
        Some((mid, dim)) => {
            let c0 = build(arena, max_prims_in_node, triangle_info, start, mid, total_nodes, ordered);
            let c1 = build(arena, max_prims_in_node, triangle_info, mid, end, total_nodes, ordered);
            arena.alloc_arc(BVHBuildNode::new_interior_node(dim, c0, c1))
        }
        None => {
            let first_prim_offset = ordered.len();
            ordered.extend(triangle_info[start..end].iter().map(|info| info.triangle_number));
            arena.alloc_arc(BVHBuildNode::new_leaf_node(first_prim_offset, n_primitives, bounds))
        }
    }
}

/// Returns the bucket of a centroid along an axis.
///
/// * `centroid_bounds` - Bounding box of the centroids.
/// * `centroid`        - The centroid.
/// * `dim`             - The axis.
#[inline]
fn bucket_index(centroid_bounds: &Bounds3f, centroid: &Vector3f, dim: Axis) -> usize {
    let b = (N_BUCKETS as Float * centroid_bounds.offset(centroid)[dim]) as usize;
    min(b, N_BUCKETS - 1)
}

/// Partition triangles using the surface area heuristic over all three axes.
///
/// Returns the pivot index and split axis for interior node creation, or
/// `None` if a leaf is cheaper or no axis can be split.
///
/// * `triangle_info`     - Triangle information.
/// * `start`             - Start index.
/// * `end`               - End index.
/// * `centroid_bounds`   - Bounding box of the centroids.
/// * `bounds`            - Bounding box of the node.
/// * `max_prims_in_node` - Maximum triangles allowed in a leaf.
fn split_sah(
    triangle_info: &mut [TriangleInfo],
    start: usize,
    end: usize,
    centroid_bounds: &Bounds3f,
    bounds: &Bounds3f,
    max_prims_in_node: usize,
) -> Option<(usize, Axis)> {
    let n_primitives = end - start;
    let area = bounds.surface_area();

    let mut best: Option<Split> = None;
    for dim in Axis::ALL {
        if centroid_bounds.p_max[dim] <= centroid_bounds.p_min[dim] {
            continue;
        }

        // Bin centroids.
        let mut buckets = [BucketInfo::default(); N_BUCKETS];
        for info in triangle_info[start..end].iter() {
            let b = bucket_index(centroid_bounds, &info.centroid, dim);
            buckets[b].count += 1;
            buckets[b].bounds = buckets[b].bounds.union(&info.bounds);
        }

        // Sweep from the right to get suffix areas, then from the left.
        let mut right_area = [0.0; N_BUCKETS];
        let mut right_count = [0_usize; N_BUCKETS];
        let (mut b1, mut count1) = (Bounds3f::EMPTY, 0);
        for i in (1..N_BUCKETS).rev() {
            b1 = b1.union(&buckets[i].bounds);
            count1 += buckets[i].count;
            right_area[i] = b1.surface_area();
            right_count[i] = count1;
        }

        let (mut b0, mut count0) = (Bounds3f::EMPTY, 0);
        for i in 0..N_BUCKETS - 1 {
            b0 = b0.union(&buckets[i].bounds);
            count0 += buckets[i].count;
            let count1 = right_count[i + 1];
            if count0 == 0 || count1 == 0 {
                continue;
            }

            let cost = if area > 0.0 {
                TRAVERSAL_COST
                    + (b0.surface_area() / area) * count0 as Float * INTERSECTION_COST
                    + (right_area[i + 1] / area) * count1 as Float * INTERSECTION_COST
            } else {
                TRAVERSAL_COST + n_primitives as Float * INTERSECTION_COST
            };
            if best.map_or(true, |s| cost < s.cost) {
                best = Some(Split { axis: dim, bucket: i, cost });
            }
        }
    }

    let split = best?;
    let leaf_cost = n_primitives as Float * INTERSECTION_COST;
    if n_primitives <= max_prims_in_node && split.cost >= leaf_cost {
        return None;
    }

    let infos = triangle_info[start..end].iter_mut();
    let offset = itertools::partition(infos, |info| {
        bucket_index(centroid_bounds, &info.centroid, split.axis) <= split.bucket
    });
    Some((start + offset, split.axis))
}

/// Partition triangles into two equally sized halves along an axis.
///
/// * `triangle_info` - Triangle information.
/// * `start`         - Starting index.
/// * `end`           - Ending index + 1.
/// * `dim`           - Axis used to partition triangles.
fn split_equal_counts(triangle_info: &mut [TriangleInfo], start: usize, end: usize, dim: Axis) -> usize {
    let mid = (start + end) / 2;
    kth_by(&mut triangle_info[start..end], mid - start, |a, b| {
        a.centroid[dim].partial_cmp(&b.centroid[dim]).unwrap_or(Ordering::Equal)
    });
    mid
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
