//! Light

use crate::bsdf::*;
use crate::geometry::*;
use crate::lm::*;
use crate::mesh::*;
use crate::pdf::*;
use crate::spectrum::*;
use std::sync::Arc;
use crate::registry::Component;

/// Positional part shared by lights and cameras. The directional part is the
/// `GeneralizedBsdf` implementation of the emitter, evaluated with
/// `BsdfType::LIGHT_DIRECTION` or `BsdfType::EYE_DIRECTION`.
pub trait Emitter: GeneralizedBsdf {
    /// Sample a position on the emitter. Returns the surface geometry and its
    /// density (area measure, or discrete for positionally degenerate
    /// emitters).
    ///
    /// * `sample` - Uniform random numbers.
    fn sample_position(&self, sample: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)>;

    /// Evaluate the positional component of the emitted quantity.
    ///
    /// * `geom` - Surface geometry on the emitter.
    fn evaluate_position(&self, geom: &SurfaceGeometry) -> Spectrum;

    /// Evaluate the density `sample_position()` would produce for `geom`.
    ///
    /// * `geom` - Surface geometry on the emitter.
    fn evaluate_position_pdf(&self, geom: &SurfaceGeometry) -> PdfEval;

    /// Upcast to the directional interface.
    fn as_generalized_bsdf(&self) -> &dyn GeneralizedBsdf;
}

/// A light source.
pub trait Light: Emitter {
    /// Returns the luminance of the total emitted power. Used to build the
    /// light selection distribution.
    fn power(&self) -> Float;

    /// Returns `true` for lights at infinity that are reached by rays
    /// escaping the scene.
    fn environment(&self) -> bool {
        false
    }

    /// Bind triangle meshes in world space to the light. Only area lights use
    /// this; other lights ignore it.
    ///
    /// * `meshes` - Meshes with their world transforms.
    fn register_meshes(&mut self, _meshes: &[(&TriangleMesh, &Transform)]) -> crate::error::Result<()> {
        Ok(())
    }

    /// Set the bounding sphere of the scene. Lights at infinity emit from it.
    ///
    /// * `center` - Center of the sphere.
    /// * `radius` - Radius of the sphere.
    fn configure_world(&mut self, _center: Vector3f, _radius: Float) {}

    /// Returns the point on the bounding sphere hit by a ray escaping the
    /// scene. Only environment lights return a point.
    ///
    /// * `ray` - The escaping ray.
    fn environment_geometry(&self, _ray: &Ray) -> Option<SurfaceGeometry> {
        None
    }
}

/// Atomic reference counted `Light`.
pub type ArcLight = Arc<dyn Light>;

impl Component for dyn Light {
    const INTERFACE: &'static str = "light";
}

/// Returns the point where a ray leaving the interior of a sphere crosses it,
/// with the normal facing inwards.
///
/// * `ray`    - The ray. Its origin must be inside the sphere.
/// * `center` - Center of the sphere.
/// * `radius` - Radius of the sphere.
pub fn exit_sphere(ray: &Ray, center: &Vector3f, radius: Float) -> Option<SurfaceGeometry> {
    let oc = ray.o - *center;
    let b = oc.dot(&ray.d);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b + disc.sqrt();
    if t <= 0.0 {
        return None;
    }
    let p = ray.at(t);
    let n = (*center - p).normalize();
    Some(SurfaceGeometry::with_normal(p, n))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn exit_sphere_from_center() {
        let ray = Ray::new(Vector3f::ZERO, Vector3f::X);
        let geom = exit_sphere(&ray, &Vector3f::ZERO, 2.0).unwrap();
        assert!(approx_eq!(f64, geom.p.x, 2.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, geom.gn.x, -1.0, epsilon = 1e-12));
    }

    #[test]
    fn exit_sphere_from_offset_origin() {
        let ray = Ray::new(Vector3f::new(0.0, 1.0, 0.0), Vector3f::Y);
        let geom = exit_sphere(&ray, &Vector3f::ZERO, 3.0).unwrap();
        assert!(approx_eq!(f64, geom.p.y, 3.0, epsilon = 1e-12));
    }
}
