//! Directional Light

use core::bsdf::*;
use core::error::*;
use core::geometry::*;
use core::light::*;
use core::lm::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::sampling::*;
use core::spectrum::*;

/// Parallel light arriving from a single direction. Positions are sampled on
/// a disk covering the scene's bounding sphere, placed upstream of the scene
/// and oriented perpendicular to the light direction.
#[derive(Clone, Debug)]
pub struct DirectionalLight {
    /// Emitted radiance.
    pub le: Spectrum,

    /// Unit direction the light travels in.
    pub direction: Vector3f,

    /// Frame around `direction` used to place disk samples.
    frame: Frame,

    /// Center of the scene bounding sphere.
    center: Vector3f,

    /// Radius of the scene bounding sphere.
    radius: Float,
}

impl DirectionalLight {
    /// Create a new `DirectionalLight`. The emitting disk is sized by
    /// `configure_world()`.
    ///
    /// * `le`        - Emitted radiance.
    /// * `direction` - Direction the light travels in.
    pub fn new(le: Spectrum, direction: Vector3f) -> Self {
        let direction = direction.normalize();
        Self {
            le,
            direction,
            frame: Frame::from_normal(&direction),
            center: Vector3f::ZERO,
            radius: 0.0,
        }
    }

    fn emits(&self, bsdf_type: BsdfType, dir: TransportDirection, wo: &Vector3f) -> bool {
        bsdf_type.matches(BsdfType::LIGHT_DIRECTION)
            && dir == TransportDirection::LE
            && same_direction(wo, &self.direction)
    }
}

impl GeneralizedBsdf for DirectionalLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, _geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::LIGHT_DIRECTION) || query.transport_dir != TransportDirection::LE {
            return None;
        }
        Some(BsdfSampleResult {
            sampled_type: BsdfType::LIGHT_DIRECTION,
            wo: self.direction,
            pdf: PdfEval::new(1.0, ProbabilityMeasure::ProjectedSolidAngle),
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> Spectrum {
        if self.emits(query.bsdf_type, query.transport_dir, &query.wo) {
            Spectrum::ONE
        } else {
            Spectrum::ZERO
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> PdfEval {
        if self.emits(query.bsdf_type, query.transport_dir, &query.wo) {
            PdfEval::new(1.0, ProbabilityMeasure::ProjectedSolidAngle)
        } else {
            PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle)
        }
    }

    fn degenerated(&self) -> bool {
        true
    }
}

impl Emitter for DirectionalLight {
    fn sample_position(&self, sample: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)> {
        if self.radius <= 0.0 {
            return None;
        }
        let d = concentric_sample_disk(sample);
        let origin = self.center - self.direction * self.radius;
        let p = origin + self.frame.to_world(&Vector3f::new(d.x * self.radius, d.y * self.radius, 0.0));
        Some((
            SurfaceGeometry::with_normal(p, self.direction),
            self.evaluate_position_pdf(&SurfaceGeometry::degenerated(p)),
        ))
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Spectrum {
        self.le
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        if self.radius > 0.0 {
            PdfEval::new(1.0 / (PI * self.radius * self.radius), ProbabilityMeasure::Area)
        } else {
            PdfEval::zero(ProbabilityMeasure::Area)
        }
    }

    fn as_generalized_bsdf(&self) -> &dyn GeneralizedBsdf {
        self
    }
}

impl Light for DirectionalLight {
    fn power(&self) -> Float {
        self.le.luminance() * PI * self.radius * self.radius
    }

    fn configure_world(&mut self, center: Vector3f, radius: Float) {
        self.center = center;
        self.radius = radius;
    }
}

/// Create a directional light from parameters.
///
/// * `params`    - Parameter set; `luminance` is required, `direction`
///                 defaults to -y.
/// * `_registry` - Unused.
pub fn create_directional_light(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Light>> {
    let le = params.get_spectrum("luminance")?;
    if le.has_negative() {
        return Err(Error::config(format!("negative luminance {}", le)));
    }
    let direction = params.find_one_vector3f("direction", -Vector3f::Y);
    if direction.length_squared() == 0.0 {
        return Err(Error::config("directional light needs a non-zero direction"));
    }
    Ok(Box::new(DirectionalLight::new(le, direction)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
