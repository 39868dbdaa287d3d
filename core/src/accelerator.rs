//! Ray Intersection Acceleration

use crate::error::*;
use crate::geometry::*;
use crate::lm::*;
use crate::mesh::*;
use crate::primitive::*;
use crate::{stat_counter, stat_inc, stat_register_fns};
use crate::registry::Component;

stat_counter!("Acceleration/Degenerate triangles skipped", N_DEGENERATE_TRIANGLES, degenerate_stats);
stat_register_fns!(degenerate_stats);

/// A scene triangle in world space with references back to its primitive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SceneTriangle {
    /// World space vertex positions.
    pub p: [Vector3f; 3],

    /// Index of the primitive.
    pub primitive: usize,

    /// Index of the triangle in the primitive's mesh.
    pub face: usize,
}

impl SceneTriangle {
    /// Returns the bounding box.
    pub fn bounds(&self) -> Bounds3f {
        Bounds3f::new(self.p[0], self.p[1]).union(&self.p[2])
    }

    /// Returns the centroid.
    pub fn centroid(&self) -> Vector3f {
        (self.p[0] + self.p[1] + self.p[2]) / 3.0
    }
}

/// Collect the world space triangles of all primitives. Triangles with zero
/// area are skipped.
///
/// * `primitives` - The primitives.
pub fn collect_triangles(primitives: &[Primitive]) -> Vec<SceneTriangle> {
    register_stats();

    let mut triangles = vec![];
    for (i, primitive) in primitives.iter().enumerate() {
        if let Some(mesh) = primitive.mesh.as_ref() {
            for face in 0..mesh.num_faces() {
                let p = mesh.world_triangle(face, &primitive.transform);
                if triangle_area(&p) > 0.0 {
                    triangles.push(SceneTriangle { p, primitive: i, face });
                } else {
                    stat_inc!(N_DEGENERATE_TRIANGLES, 1);
                }
            }
        }
    }
    triangles
}

/// A ray hit reported by an accelerator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TriangleHit {
    /// Index of the primitive.
    pub primitive: usize,

    /// Index of the triangle in the primitive's mesh.
    pub face: usize,

    /// Barycentric coordinates of vertices 1 and 2.
    pub b: Vector2f,

    /// Ray parameter.
    pub t: Float,
}

/// Ray-scene intersection structure. `build()` is called once before any
/// query; afterwards the structure is immutable and shared by all workers.
pub trait Accelerator: Send + Sync {
    /// Build the structure over the triangles of all primitives.
    ///
    /// * `primitives` - The primitives.
    fn build(&mut self, primitives: &[Primitive]) -> Result<()>;

    /// Find the closest hit within the ray's range. On a hit `ray.max_t` is
    /// set to the hit distance.
    ///
    /// * `ray` - The ray.
    fn intersect(&self, ray: &mut Ray) -> Option<TriangleHit>;
}

impl Component for dyn Accelerator {
    const INTERFACE: &'static str = "accelerator";
}
