//! Primitives

use crate::bsdf::*;
use crate::camera::*;
use crate::geometry::*;
use crate::light::*;
use crate::lm::*;
use crate::mesh::*;
use std::fmt;
use std::sync::Arc;

/// An instance of a scene node: a mesh placed in the world with its surface
/// model and optional emitters. Nodes without a mesh carry environment and
/// directional lights or cameras.
#[derive(Clone)]
pub struct Primitive {
    /// Identifier of the scene node.
    pub id: String,

    /// Object to world transformation.
    pub transform: Transform,

    /// Mesh.
    pub mesh: Option<Arc<TriangleMesh>>,

    /// Surface scattering model.
    pub bsdf: Option<ArcBsdf>,

    /// Light attached to the mesh.
    pub light: Option<ArcLight>,

    /// Camera.
    pub camera: Option<ArcCamera>,
}

impl Primitive {
    /// Create a primitive without surface models or emitters.
    ///
    /// * `id`        - Identifier of the scene node.
    /// * `transform` - Object to world transformation.
    pub fn new(id: &str, transform: Transform) -> Self {
        Self {
            id: id.to_string(),
            transform,
            mesh: None,
            bsdf: None,
            light: None,
            camera: None,
        }
    }

    /// Returns the inverse of the object to world transformation.
    pub fn inverse_transform(&self) -> Transform {
        self.transform.inverse()
    }

    /// Transform a normal from object to world space.
    ///
    /// * `n` - The normal.
    pub fn transform_normal(&self, n: &Vector3f) -> Vector3f {
        self.transform.transform_normal(n).normalize()
    }

    /// Returns the world space geometry of a point on a triangle. Returns
    /// `None` for primitives without a mesh.
    ///
    /// * `face` - Triangle index.
    /// * `b`    - Barycentric coordinates of vertices 1 and 2.
    pub fn surface_geometry(&self, face: usize, b: &Vector2f) -> Option<SurfaceGeometry> {
        let mesh = self.mesh.as_ref()?;
        let [p0, p1, p2] = mesh.world_triangle(face, &self.transform);
        let p = p0 * (1.0 - b.x - b.y) + p1 * b.x + p2 * b.y;
        let gn = (p1 - p0).cross(&(p2 - p0)).normalize();
        let (n, uv) = mesh.interpolate(face, b);
        let sn = match n {
            Some(n) if n.length_squared() > 0.0 => self.transform_normal(&n),
            _ => gn,
        };
        Some(SurfaceGeometry::new(p, gn, sn, uv))
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("id", &self.id)
            .field("faces", &self.mesh.as_ref().map_or(0, |m| m.num_faces()))
            .field("bsdf", &self.bsdf.is_some())
            .field("light", &self.light.is_some())
            .field("camera", &self.camera.is_some())
            .finish()
    }
}

/// A ray hit on a primitive with the surface geometry at the hit point.
#[derive(Clone)]
pub struct Intersection<'a> {
    /// Surface geometry at the hit point.
    pub geom: SurfaceGeometry,

    /// The primitive that was hit.
    pub primitive: &'a Primitive,

    /// Index of the primitive in the scene.
    pub primitive_index: usize,

    /// Index of the triangle in the primitive's mesh.
    pub face: usize,

    /// Barycentric coordinates of the hit.
    pub b: Vector2f,

    /// Ray parameter of the hit.
    pub t: Float,
}

impl<'a> Intersection<'a> {
    /// Returns the surface scattering model.
    pub fn bsdf(&self) -> Option<&'a dyn GeneralizedBsdf> {
        self.primitive.bsdf.as_deref()
    }

    /// Returns the light attached to the hit surface.
    pub fn light(&self) -> Option<&'a dyn Light> {
        self.primitive.light.as_deref()
    }

    /// Returns the camera attached to the hit surface.
    pub fn camera(&self) -> Option<&'a dyn Camera> {
        self.primitive.camera.as_deref()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
