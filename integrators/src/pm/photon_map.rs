//! Photon Maps

use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;
use core::registry::*;
use core::spectrum::*;
use order_stat::kth_by;
use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A light particle stored at a non-specular surface.
#[derive(Copy, Clone, Debug, Default)]
pub struct Photon {
    /// Position.
    pub p: Vector3f,

    /// Direction towards the previous vertex of the light path.
    pub wi: Vector3f,

    /// Throughput (flux) of the light path up to the photon.
    pub throughput: Spectrum,

    /// Number of scattering events before the photon was stored.
    pub depth: usize,
}

/// Spatial index over photons.
pub trait PhotonMap: Send + Sync {
    /// Returns the implementation name.
    fn name(&self) -> &'static str;

    /// Replace the stored photons.
    ///
    /// * `photons` - The photons.
    fn build(&mut self, photons: Vec<Photon>);

    /// Returns the stored photons. Indices passed to collect callbacks refer
    /// to this slice.
    fn photons(&self) -> &[Photon];

    /// Visit every photon whose squared distance to `p` is less than
    /// `max_dist2`. The callback receives the photon index and its squared
    /// distance and may shrink the search radius.
    ///
    /// * `p`         - Query point.
    /// * `max_dist2` - Squared search radius.
    /// * `collect`   - Callback.
    fn collect_photons(&self, p: &Vector3f, max_dist2: Float, collect: &mut dyn FnMut(usize, Float, &mut Float));

    /// Returns an empty map of the same implementation.
    fn clone_empty(&self) -> Box<dyn PhotonMap>;

    /// Returns the number of photons.
    fn len(&self) -> usize {
        self.photons().len()
    }

    /// Returns `true` if there are no photons.
    fn is_empty(&self) -> bool {
        self.photons().is_empty()
    }

    /// Visit every photon within a fixed radius.
    ///
    /// * `p`       - Query point.
    /// * `radius2` - Squared radius.
    /// * `visit`   - Callback receiving the photon.
    fn collect_in_radius(&self, p: &Vector3f, radius2: Float, visit: &mut dyn FnMut(&Photon)) {
        let photons = self.photons();
        self.collect_photons(p, radius2, &mut |i: usize, _: Float, _: &mut Float| visit(&photons[i]));
    }
}

impl Component for dyn PhotonMap {
    const INTERFACE: &'static str = "photon_map";
}

/// Reusable k nearest neighbour query. The farthest photon found so far is at
/// the top of a max-heap and bounds the search radius once k photons are
/// found.
pub struct KnnQuery {
    /// Maximum number of photons.
    k: usize,

    /// (squared distance, photon index).
    heap: BinaryHeap<(OrderedFloat<Float>, usize)>,
}

impl KnnQuery {
    /// Create a query for up to `k` photons.
    ///
    /// * `k` - Maximum number of photons.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    /// Collect the nearest photons to `p` within `max_dist2`. Returns the
    /// squared distance of the farthest collected photon if k photons were
    /// found, otherwise `max_dist2`.
    ///
    /// * `map`       - The photon map.
    /// * `p`         - Query point.
    /// * `max_dist2` - Squared search radius.
    pub fn collect(&mut self, map: &dyn PhotonMap, p: &Vector3f, max_dist2: Float) -> Float {
        self.heap.clear();
        if self.k == 0 {
            return max_dist2;
        }
        let k = self.k;
        let heap = &mut self.heap;
        let mut radius2 = max_dist2;
        map.collect_photons(p, max_dist2, &mut |i: usize, dist2: Float, max_dist2: &mut Float| {
            if heap.len() == k {
                heap.pop();
            }
            heap.push((OrderedFloat(dist2), i));
            if heap.len() == k {
                if let Some((farthest, _)) = heap.peek() {
                    *max_dist2 = farthest.0;
                    radius2 = farthest.0;
                }
            }
        });
        radius2
    }

    /// Returns the number of collected photons.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no photon was collected.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Returns the collected (squared distance, photon index) pairs in no
    /// particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Float, usize)> + '_ {
        self.heap.iter().map(|(d, i)| (d.0, *i))
    }
}

/// Linear scan over every photon.
#[derive(Clone, Debug, Default)]
pub struct NaivePhotonMap {
    photons: Vec<Photon>,
}

impl NaivePhotonMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhotonMap for NaivePhotonMap {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn build(&mut self, photons: Vec<Photon>) {
        self.photons = photons;
    }

    fn photons(&self) -> &[Photon] {
        &self.photons
    }

    fn collect_photons(&self, p: &Vector3f, max_dist2: Float, collect: &mut dyn FnMut(usize, Float, &mut Float)) {
        let mut max_dist2 = max_dist2;
        for (i, photon) in self.photons.iter().enumerate() {
            let dist2 = (photon.p - *p).length_squared();
            if dist2 < max_dist2 {
                collect(i, dist2, &mut max_dist2);
            }
        }
    }

    fn clone_empty(&self) -> Box<dyn PhotonMap> {
        Box::new(Self::new())
    }
}

/// Kd-tree node. Node `i` holds photon `i`; its left child, if any, is node
/// `i + 1`.
#[derive(Copy, Clone, Debug)]
struct KdNode {
    /// Split axis; `None` for leaves.
    axis: Option<Axis>,

    /// Split position.
    split: Float,

    /// Whether node `i + 1` is the left child.
    has_left: bool,

    /// Index of the right child.
    right: Option<usize>,
}

impl KdNode {
    const LEAF: Self = Self {
        axis: None,
        split: 0.0,
        has_left: false,
        right: None,
    };
}

/// Left-balanced kd-tree split at the median photon along the longest axis
/// of each node's bounds.
#[derive(Clone, Debug, Default)]
pub struct KdTreePhotonMap {
    nodes: Vec<KdNode>,
    photons: Vec<Photon>,
}

impl KdTreePhotonMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn build_recursive(
        &mut self,
        node: usize,
        source: &[Photon],
        indices: &mut [usize],
        next_node: &mut usize,
    ) {
        if indices.len() == 1 {
            self.nodes[node] = KdNode::LEAF;
            self.photons[node] = source[indices[0]];
            return;
        }

        let bounds = indices
            .iter()
            .fold(Bounds3f::EMPTY, |b, &i| b.union(&source[i].p));
        let axis = bounds.longest_axis();
        let mid = indices.len() / 2;
        kth_by(indices, mid, |&a, &b| {
            source[a].p[axis]
                .partial_cmp(&source[b].p[axis])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });

        let photon = source[indices[mid]];
        self.nodes[node] = KdNode {
            axis: Some(axis),
            split: photon.p[axis],
            has_left: false,
            right: None,
        };
        self.photons[node] = photon;

        let (left, rest) = indices.split_at_mut(mid);
        let right = &mut rest[1..];
        if !left.is_empty() {
            self.nodes[node].has_left = true;
            let child = *next_node;
            *next_node += 1;
            self.build_recursive(child, source, left, next_node);
        }
        if !right.is_empty() {
            let child = *next_node;
            *next_node += 1;
            self.nodes[node].right = Some(child);
            self.build_recursive(child, source, right, next_node);
        }
    }

    fn collect_recursive(
        &self,
        node: usize,
        p: &Vector3f,
        max_dist2: &mut Float,
        collect: &mut dyn FnMut(usize, Float, &mut Float),
    ) {
        let n = self.nodes[node];
        if let Some(axis) = n.axis {
            let d = p[axis] - n.split;
            let left = if n.has_left { Some(node + 1) } else { None };
            // Visit the half containing the query first.
            let (near, far) = if d <= 0.0 { (left, n.right) } else { (n.right, left) };
            if let Some(child) = near {
                self.collect_recursive(child, p, max_dist2, collect);
            }
            if let Some(child) = far {
                if d * d < *max_dist2 {
                    self.collect_recursive(child, p, max_dist2, collect);
                }
            }
        }

        let dist2 = (self.photons[node].p - *p).length_squared();
        if dist2 < *max_dist2 {
            collect(node, dist2, max_dist2);
        }
    }
}

impl PhotonMap for KdTreePhotonMap {
    fn name(&self) -> &'static str {
        "kdtree"
    }

    fn build(&mut self, photons: Vec<Photon>) {
        let n = photons.len();
        self.nodes = vec![KdNode::LEAF; n];
        self.photons = vec![Photon::default(); n];
        if n == 0 {
            return;
        }
        let mut indices: Vec<usize> = (0..n).collect();
        let mut next_node = 1;
        self.build_recursive(0, &photons, &mut indices, &mut next_node);
        info!("Built kd-tree photon map with {} nodes", self.nodes.len());
    }

    fn photons(&self) -> &[Photon] {
        &self.photons
    }

    fn collect_photons(&self, p: &Vector3f, max_dist2: Float, collect: &mut dyn FnMut(usize, Float, &mut Float)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut max_dist2 = max_dist2;
        self.collect_recursive(0, p, &mut max_dist2, collect);
    }

    fn clone_empty(&self) -> Box<dyn PhotonMap> {
        Box::new(Self::new())
    }
}

/// Create a kd-tree photon map.
///
/// * `_params`   - Parameter set (unused).
/// * `_registry` - The registry (unused).
pub fn create_kd_tree_photon_map(_params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn PhotonMap>> {
    Ok(Box::new(KdTreePhotonMap::new()))
}

/// Create a naive photon map.
///
/// * `_params`   - Parameter set (unused).
/// * `_registry` - The registry (unused).
pub fn create_naive_photon_map(_params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn PhotonMap>> {
    Ok(Box::new(NaivePhotonMap::new()))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use core::rng::*;
    use proptest::prelude::*;

    fn uniform_photons(n: usize, seed: u32) -> Vec<Photon> {
        let mut rng = RngType::StandardMt.create(seed);
        (0..n)
            .map(|_| Photon {
                p: Vector3f::new(rng.next_float(), rng.next_float(), rng.next_float()),
                ..Photon::default()
            })
            .collect()
    }

    fn sorted_distances(map: &dyn PhotonMap, query: &KnnQuery) -> Vec<Float> {
        for (d, i) in query.iter() {
            assert_eq!(d, (map.photons()[i].p - Vector3f::splat(0.5)).length_squared());
        }
        let mut d: Vec<Float> = query.iter().map(|(d, _)| d).collect();
        d.sort_by(|a, b| a.partial_cmp(b).unwrap());
        d
    }

    #[test]
    fn kd_tree_knn_matches_naive() {
        let photons = uniform_photons(10_000, 3);
        let mut kd = KdTreePhotonMap::new();
        let mut naive = NaivePhotonMap::new();
        kd.build(photons.clone());
        naive.build(photons);
        assert_eq!(kd.len(), 10_000);

        let p = Vector3f::splat(0.5);
        let mut a = KnnQuery::new(100);
        let mut b = KnnQuery::new(100);
        let ra = a.collect(&kd, &p, 0.25);
        let rb = b.collect(&naive, &p, 0.25);
        assert_eq!(a.len(), 100);
        assert_eq!(b.len(), 100);
        assert_eq!(ra, rb);
        assert!(ra <= 0.25);
        assert_eq!(sorted_distances(&kd, &a), sorted_distances(&naive, &b));
    }

    #[test]
    fn knn_keeps_search_radius_when_too_few_photons() {
        let mut kd = KdTreePhotonMap::new();
        kd.build(uniform_photons(20, 5));
        let mut query = KnnQuery::new(50);
        let r = query.collect(&kd, &Vector3f::splat(0.5), 10.0);
        assert_eq!(query.len(), 20);
        assert_eq!(r, 10.0);
    }

    #[test]
    fn empty_maps_collect_nothing() {
        for map in [
            Box::new(KdTreePhotonMap::new()) as Box<dyn PhotonMap>,
            Box::new(NaivePhotonMap::new()),
        ] {
            let mut query = KnnQuery::new(10);
            query.collect(map.as_ref(), &Vector3f::ZERO, 1.0);
            assert!(query.is_empty());
            assert!(map.clone_empty().is_empty());
        }
    }

    proptest! {
        #[test]
        fn radius_queries_agree(
            seed in 0u32..1000,
            x in 0.0..1.0f64,
            y in 0.0..1.0f64,
            z in 0.0..1.0f64,
            r2 in 0.001..0.1f64,
        ) {
            let photons = uniform_photons(500, seed);
            let mut kd = KdTreePhotonMap::new();
            let mut naive = NaivePhotonMap::new();
            kd.build(photons.clone());
            naive.build(photons);

            let p = Vector3f::new(x, y, z);
            let mut a = 0;
            let mut b = 0;
            kd.collect_in_radius(&p, r2, &mut |_: &Photon| a += 1);
            naive.collect_in_radius(&p, r2, &mut |_: &Photon| b += 1);
            prop_assert_eq!(a, b);
        }
    }
}
