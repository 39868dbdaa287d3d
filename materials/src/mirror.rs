//! Perfect Mirror

use core::bsdf::*;
use core::error::*;
use core::geometry::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::spectrum::*;

/// Ideal specular reflection about the shading normal.
#[derive(Clone, Debug)]
pub struct MirrorBsdf {
    /// Specular reflectance.
    pub r: Spectrum,
}

impl MirrorBsdf {
    /// Create a new `MirrorBsdf`.
    ///
    /// * `r` - Specular reflectance.
    pub fn new(r: Spectrum) -> Self {
        Self { r }
    }

    /// Returns the local directions if `wo` is the mirror image of `wi` above
    /// the shading plane.
    fn local_pair(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Option<(Vector3f, Vector3f)> {
        if !query.bsdf_type.matches(BsdfType::SPECULAR_REFLECTION) {
            return None;
        }
        let local_wi = geom.to_shading(&query.wi);
        let local_wo = geom.to_shading(&query.wo);
        if cos_theta_z_up(&local_wi) <= 0.0
            || cos_theta_z_up(&local_wo) <= 0.0
            || !same_direction(&reflect_z_up(&local_wi), &local_wo)
        {
            return None;
        }
        Some((local_wi, local_wo))
    }
}

impl GeneralizedBsdf for MirrorBsdf {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::SPECULAR_REFLECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::SPECULAR_REFLECTION) {
            return None;
        }
        let local_wi = geom.to_shading(&query.wi);
        if cos_theta_z_up(&local_wi) <= 0.0 {
            return None;
        }

        let local_wo = reflect_z_up(&local_wi);
        Some(BsdfSampleResult {
            sampled_type: BsdfType::SPECULAR_REFLECTION,
            wo: geom.to_world(&local_wo),
            pdf: PdfEval::new(1.0 / cos_theta_z_up(&local_wo), ProbabilityMeasure::ProjectedSolidAngle),
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
        self.r * (sf / cos_theta_z_up(&local_wi))
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        match self.local_pair(query, geom) {
            Some((local_wi, _)) => PdfEval::new(
                1.0 / cos_theta_z_up(&local_wi),
                ProbabilityMeasure::ProjectedSolidAngle,
            ),
            None => PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle),
        }
    }

    fn degenerated(&self) -> bool {
        true
    }
}

/// Create a mirror BSDF from parameters.
///
/// * `params`    - Parameter set; `specular_reflectance` defaults to white.
/// * `_registry` - Unused.
pub fn create_mirror_bsdf(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn GeneralizedBsdf>> {
    let r = params.find_one_spectrum("specular_reflectance", Spectrum::ONE);
    if r.has_negative() {
        return Err(Error::config(format!("negative specular reflectance {}", r)));
    }
    Ok(Box::new(MirrorBsdf::new(r)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    fn sample_query(wi: Vector3f) -> BsdfSampleQuery {
        BsdfSampleQuery {
            bsdf_type: BsdfType::ALL_BSDF,
            sample: Vector2f::new(0.5, 0.5),
            u_comp: 0.5,
            transport_dir: TransportDirection::EL,
            wi,
        }
    }

    #[test]
    fn reflects_about_normal() {
        let bsdf = MirrorBsdf::new(Spectrum::splat(0.9));
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Y);
        let wi = Vector3f::new(1.0, 1.0, 0.0).normalize();
        let (result, weight) = bsdf.sample_and_estimate_direction(&sample_query(wi), &geom).unwrap();

        assert!((result.wo - Vector3f::new(-1.0, 1.0, 0.0).normalize()).length() < 1e-12);
        assert_eq!(result.sampled_type, BsdfType::SPECULAR_REFLECTION);
        assert!(approx_eq!(f64, weight[0], 0.9, epsilon = 1e-12));
        assert!(approx_eq!(f64, result.pdf.v, std::f64::consts::SQRT_2, epsilon = 1e-12));
    }

    #[test]
    fn other_directions_evaluate_to_zero() {
        let bsdf = MirrorBsdf::new(Spectrum::ONE);
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::new(0.3, 0.0, 1.0).normalize();
        let wo = Vector3f::new(0.3, 0.0, 1.0).normalize();
        let q = BsdfEvalQuery::new(BsdfType::ALL_BSDF, TransportDirection::EL, wi, wo);
        assert!(bsdf.evaluate_direction(&q, &geom).is_black());
        assert!(bsdf.evaluate_direction_pdf(&q, &geom).is_zero());
    }

    #[test]
    fn reverse_query_has_same_density() {
        let bsdf = MirrorBsdf::new(Spectrum::ONE);
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::new(0.4, -0.2, 1.0).normalize();
        let q = sample_query(wi);
        let bidir = bsdf.sample_and_estimate_direction_bidir(&q, &geom).unwrap();
        let (fwd, rev) = (bidir.pdf[TransportDirection::EL], bidir.pdf[TransportDirection::LE]);
        assert!(approx_eq!(f64, fwd.v, rev.v, epsilon = 1e-9));
        assert!(approx_eq!(f64, bidir.weight[TransportDirection::LE][1], 1.0, epsilon = 1e-9));
    }

    #[test]
    fn is_degenerate() {
        assert!(MirrorBsdf::new(Spectrum::ONE).degenerated());
    }
}
