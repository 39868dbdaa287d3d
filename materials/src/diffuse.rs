//! Diffuse Reflection

use core::bsdf::*;
use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::sampling::*;
use core::spectrum::*;

/// Lambertian reflection from the front side of the shading frame.
#[derive(Clone, Debug)]
pub struct DiffuseBsdf {
    /// Diffuse reflectance.
    pub r: Spectrum,
}

impl DiffuseBsdf {
    /// Create a new `DiffuseBsdf`.
    ///
    /// * `r` - Diffuse reflectance.
    pub fn new(r: Spectrum) -> Self {
        Self { r }
    }

    /// Returns the local directions if both lie above the shading plane.
    fn local_pair(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Option<(Vector3f, Vector3f)> {
        if !query.bsdf_type.matches(BsdfType::DIFFUSE_REFLECTION) {
            return None;
        }
        let local_wi = geom.to_shading(&query.wi);
        let local_wo = geom.to_shading(&query.wo);
        if cos_theta_z_up(&local_wi) <= 0.0 || cos_theta_z_up(&local_wo) <= 0.0 {
            None
        } else {
            Some((local_wi, local_wo))
        }
    }
}

impl GeneralizedBsdf for DiffuseBsdf {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::DIFFUSE_REFLECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::DIFFUSE_REFLECTION) {
            return None;
        }
        let local_wi = geom.to_shading(&query.wi);
        if cos_theta_z_up(&local_wi) <= 0.0 {
            return None;
        }

        let local_wo = cosine_sample_hemisphere(&query.sample);
        Some(BsdfSampleResult {
            sampled_type: BsdfType::DIFFUSE_REFLECTION,
            wo: geom.to_world(&local_wo),
            pdf: cosine_hemisphere_pdf_projected(),
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Spectrum {
        let (local_wi, local_wo) = match self.local_pair(query, geom) {
            Some(pair) => pair,
            None => return Spectrum::ZERO,
        };
        let sf = shading_normal_correction_factor(
            query.transport_dir,
            geom,
            &local_wi,
            &local_wo,
            &query.wi,
            &query.wo,
        );
        if sf == 0.0 {
            return Spectrum::ZERO;
        }
        self.r * (INV_PI * sf)
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        match self.local_pair(query, geom) {
            Some(_) => cosine_hemisphere_pdf_projected(),
            None => PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle),
        }
    }
}

/// Create a diffuse BSDF from parameters.
///
/// * `params`    - Parameter set; `diffuse_reflectance` defaults to white.
/// * `_registry` - Unused.
pub fn create_diffuse_bsdf(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn GeneralizedBsdf>> {
    let r = params.find_one_spectrum("diffuse_reflectance", Spectrum::ONE);
    if r.has_negative() {
        return Err(Error::config(format!("negative diffuse reflectance {}", r)));
    }
    if r.max_component_value() > 1.0 {
        warn!("Diffuse reflectance {} exceeds 1; the surface amplifies light", r);
    }
    Ok(Box::new(DiffuseBsdf::new(r)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
