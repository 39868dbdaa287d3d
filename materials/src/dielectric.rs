//! Smooth Dielectric

use core::bsdf::*;
use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::spectrum::*;

/// Returns the Fresnel reflectance of a dielectric interface and the signed
/// cosine of the transmitted direction. The cosine is 0 on total internal
/// reflection and has the opposite sign of `cos_theta_i` otherwise.
///
/// * `cos_theta_i` - Signed cosine of the incident direction.
/// * `eta_i`       - Index of refraction on the incident side.
/// * `eta_t`       - Index of refraction on the transmitted side.
pub fn fr_dielectric(cos_theta_i: Float, eta_i: Float, eta_t: Float) -> (Float, Float) {
    if eta_i == eta_t {
        return (0.0, -cos_theta_i);
    }

    let cos_i = abs(cos_theta_i);
    let eta = eta_i / eta_t;
    let sin2_t = eta * eta * max(0.0, 1.0 - cos_i * cos_i);
    if sin2_t >= 1.0 {
        return (1.0, 0.0);
    }

    let cos_t = (1.0 - sin2_t).sqrt();
    let r_parl = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perp = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    let fr = 0.5 * (r_parl * r_parl + r_perp * r_perp);
    (fr, if cos_theta_i > 0.0 { -cos_t } else { cos_t })
}

/// Ideal reflection and refraction at a smooth interface between two media.
/// The shading normal points into the external medium.
#[derive(Clone, Debug)]
pub struct DielectricBsdf {
    /// Specular reflectance scale.
    pub r: Spectrum,

    /// Specular transmittance scale.
    pub t: Spectrum,

    /// Index of refraction of the external medium.
    pub eta_ext: Float,

    /// Index of refraction of the internal medium.
    pub eta_int: Float,
}

/// Interface state for an incident direction.
struct Interface {
    /// Ratio of incident to transmitted index of refraction.
    eta: Float,

    /// Fresnel reflectance.
    fr: Float,

    /// Signed cosine of the transmitted direction.
    cos_theta_t: Float,
}

impl DielectricBsdf {
    /// Create a new `DielectricBsdf`.
    ///
    /// * `r`       - Specular reflectance scale.
    /// * `t`       - Specular transmittance scale.
    /// * `eta_ext` - Index of refraction of the external medium.
    /// * `eta_int` - Index of refraction of the internal medium.
    pub fn new(r: Spectrum, t: Spectrum, eta_ext: Float, eta_int: Float) -> Self {
        Self { r, t, eta_ext, eta_int }
    }

    /// Returns the interface state seen from a local incident direction.
    ///
    /// * `local_wi` - Incident direction in shading coordinates.
    fn interface(&self, local_wi: &Vector3f) -> Interface {
        let cos_theta_i = cos_theta_z_up(local_wi);
        let (eta_i, eta_t) = if cos_theta_i > 0.0 {
            (self.eta_ext, self.eta_int)
        } else {
            (self.eta_int, self.eta_ext)
        };
        let (fr, cos_theta_t) = fr_dielectric(cos_theta_i, eta_i, eta_t);
        Interface {
            eta: eta_i / eta_t,
            fr,
            cos_theta_t,
        }
    }

    /// Radiance scale for refraction. Radiance is compressed by (ηi/ηt)² when
    /// it crosses into the incident side; importance is not.
    ///
    /// * `dir` - Transport direction.
    /// * `eta` - Ratio of incident to transmitted index of refraction.
    fn transmission_factor(dir: TransportDirection, eta: Float) -> Float {
        match dir {
            TransportDirection::EL => eta * eta,
            TransportDirection::LE => 1.0,
        }
    }

    /// Returns the components of the query mask that the model provides.
    fn allowed(bsdf_type: BsdfType) -> (bool, bool) {
        (
            bsdf_type.matches(BsdfType::SPECULAR_REFLECTION),
            bsdf_type.matches(BsdfType::SPECULAR_TRANSMISSION),
        )
    }

    /// Probability of choosing reflection given the mask and Fresnel term.
    fn reflection_probability(use_r: bool, use_t: bool, fr: Float) -> Float {
        match (use_r, use_t) {
            (true, true) => fr,
            (true, false) => 1.0,
            _ => 0.0,
        }
    }

    /// Classifies an evaluation query. Returns the local directions and
    /// whether it describes a reflection, or `None` if `wo` is not the
    /// specular image of `wi` or the component is masked out.
    fn classify(
        &self,
        query: &BsdfEvalQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(Vector3f, Vector3f, Interface, bool)> {
        let (use_r, use_t) = Self::allowed(query.bsdf_type);
        let local_wi = geom.to_shading(&query.wi);
        let local_wo = geom.to_shading(&query.wo);
        let cos_i = cos_theta_z_up(&local_wi);
        let cos_o = cos_theta_z_up(&local_wo);
        if cos_i == 0.0 || cos_o == 0.0 {
            return None;
        }

        let iface = self.interface(&local_wi);
        if cos_i * cos_o > 0.0 {
            if !use_r || !same_direction(&reflect_z_up(&local_wi), &local_wo) {
                return None;
            }
            Some((local_wi, local_wo, iface, true))
        } else {
            if !use_t || iface.cos_theta_t == 0.0 {
                return None;
            }
            let refracted = refract_z_up(&local_wi, iface.eta, iface.cos_theta_t);
            if !same_direction(&refracted, &local_wo) {
                return None;
            }
            Some((local_wi, local_wo, iface, false))
        }
    }
}

impl GeneralizedBsdf for DielectricBsdf {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::SPECULAR
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        let (use_r, use_t) = Self::allowed(query.bsdf_type);
        if !use_r && !use_t {
            return None;
        }

        let local_wi = geom.to_shading(&query.wi);
        let cos_theta_i = cos_theta_z_up(&local_wi);
        if cos_theta_i == 0.0 {
            return None;
        }

        let iface = self.interface(&local_wi);
        let p_r = Self::reflection_probability(use_r, use_t, iface.fr);
        let tir = iface.cos_theta_t == 0.0;

        if use_r && (query.u_comp <= p_r || tir) {
            let local_wo = reflect_z_up(&local_wi);
            let p = if tir { 1.0 } else { p_r };
            Some(BsdfSampleResult {
                sampled_type: BsdfType::SPECULAR_REFLECTION,
                wo: geom.to_world(&local_wo),
                pdf: PdfEval::new(p / abs(cos_theta_i), ProbabilityMeasure::ProjectedSolidAngle),
            })
        } else if tir {
            None
        } else {
            let local_wo = refract_z_up(&local_wi, iface.eta, iface.cos_theta_t);
            Some(BsdfSampleResult {
                sampled_type: BsdfType::SPECULAR_TRANSMISSION,
                wo: geom.to_world(&local_wo),
                pdf: PdfEval::new(
                    (1.0 - p_r) / abs(iface.cos_theta_t),
                    ProbabilityMeasure::ProjectedSolidAngle,
                ),
            })
        }
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Spectrum {
        let (local_wi, local_wo, iface, reflection) = match self.classify(query, geom) {
            Some(c) => c,
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

        if reflection {
            self.r * (iface.fr * sf / abs(cos_theta_z_up(&local_wi)))
        } else {
            let tf = Self::transmission_factor(query.transport_dir, iface.eta);
            self.t * ((1.0 - iface.fr) * tf * sf / abs(iface.cos_theta_t))
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        let (use_r, use_t) = Self::allowed(query.bsdf_type);
        let (local_wi, _, iface, reflection) = match self.classify(query, geom) {
            Some(c) => c,
            None => return PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle),
        };

        let p_r = Self::reflection_probability(use_r, use_t, iface.fr);
        let v = if reflection {
            let p = if iface.cos_theta_t == 0.0 { 1.0 } else { p_r };
            p / abs(cos_theta_z_up(&local_wi))
        } else {
            (1.0 - p_r) / abs(iface.cos_theta_t)
        };
        PdfEval::new(v, ProbabilityMeasure::ProjectedSolidAngle)
    }

    fn degenerated(&self) -> bool {
        true
    }
}

/// Create a dielectric BSDF from parameters.
///
/// * `params`    - Parameter set.
/// * `_registry` - Unused.
pub fn create_dielectric_bsdf(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn GeneralizedBsdf>> {
    let r = params.find_one_spectrum("specular_reflectance", Spectrum::ONE);
    let t = params.find_one_spectrum("specular_transmittance", Spectrum::ONE);
    let eta_ext = params.find_one_positive_float("external_ior", 1.0)?;
    let eta_int = params.find_one_positive_float("internal_ior", 1.0)?;
    if eta_ext == eta_int {
        debug!("Dielectric with matching indices of refraction {} is invisible", eta_ext);
    }
    Ok(Box::new(DielectricBsdf::new(r, t, eta_ext, eta_int)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn glass() -> DielectricBsdf {
        DielectricBsdf::new(Spectrum::ONE, Spectrum::ONE, 1.0, 1.5)
    }

    fn query(dir: TransportDirection, wi: Vector3f, u_comp: Float) -> BsdfSampleQuery {
        BsdfSampleQuery {
            bsdf_type: BsdfType::ALL_BSDF,
            sample: Vector2f::new(0.5, 0.5),
            u_comp,
            transport_dir: dir,
            wi,
        }
    }

    #[test]
    fn normal_incidence_reflectance() {
        let (fr, cos_t) = fr_dielectric(1.0, 1.0, 1.5);
        assert!(approx_eq!(f64, fr, 0.04, epsilon = 1e-12));
        assert!(approx_eq!(f64, cos_t, -1.0, epsilon = 1e-12));
    }

    #[test]
    fn total_internal_reflection() {
        let cos_i = -(0.2_f64);
        let (fr, cos_t) = fr_dielectric(cos_i, 1.5, 1.0);
        assert_eq!(fr, 1.0);
        assert_eq!(cos_t, 0.0);

        let bsdf = glass();
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::new((1.0 - cos_i * cos_i).sqrt(), 0.0, cos_i);
        let result = bsdf.sample_direction(&query(TransportDirection::EL, wi, 0.99), &geom).unwrap();
        assert_eq!(result.sampled_type, BsdfType::SPECULAR_REFLECTION);
        assert!(result.wo.z < 0.0);
    }

    #[test]
    fn refraction_follows_snell() {
        let bsdf = glass();
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::new(0.5, 0.0, 0.75_f64.sqrt());
        let result = bsdf.sample_direction(&query(TransportDirection::EL, wi, 0.99), &geom).unwrap();
        assert_eq!(result.sampled_type, BsdfType::SPECULAR_TRANSMISSION);
        assert!(result.wo.z < 0.0);
        // sin θt = sin θi / 1.5
        assert!(approx_eq!(f64, -result.wo.x, 0.5 / 1.5, epsilon = 1e-12));
        assert!(approx_eq!(f64, result.wo.length(), 1.0, epsilon = 1e-12));
    }

    #[test]
    fn transmitted_radiance_is_scaled_only_for_eye_paths() {
        let bsdf = glass();
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::Z;
        let (fr, _) = fr_dielectric(1.0, 1.0, 1.5);

        let (_, w_el) = bsdf
            .sample_and_estimate_direction(&query(TransportDirection::EL, wi, 0.99), &geom)
            .unwrap();
        let (_, w_le) = bsdf
            .sample_and_estimate_direction(&query(TransportDirection::LE, wi, 0.99), &geom)
            .unwrap();
        assert!(approx_eq!(f64, w_el[0], 1.0 / 2.25, epsilon = 1e-9));
        assert!(approx_eq!(f64, w_le[0], 1.0, epsilon = 1e-9));
        assert!(fr > 0.0);
    }

    #[test]
    fn reflection_only_mask_uses_fresnel_weight() {
        let bsdf = glass();
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::new(0.6, 0.0, 0.8);
        let mut q = query(TransportDirection::EL, wi, 0.99);
        q.bsdf_type = BsdfType::SPECULAR_REFLECTION;
        let (result, weight) = bsdf.sample_and_estimate_direction(&q, &geom).unwrap();
        let (fr, _) = fr_dielectric(0.8, 1.0, 1.5);
        assert!(approx_eq!(f64, result.pdf.v, 1.0 / 0.8, epsilon = 1e-12));
        assert!(approx_eq!(f64, weight[1], fr, epsilon = 1e-9));
    }

    #[test]
    fn reflection_frequency_matches_fresnel() {
        let bsdf = glass();
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::new(0.8, 0.0, 0.6);
        let (fr, _) = fr_dielectric(0.6, 1.0, 1.5);
        let n = 1000;
        let reflected = (0..n)
            .filter(|i| {
                let u = (*i as Float + 0.5) / n as Float;
                let r = bsdf.sample_direction(&query(TransportDirection::EL, wi, u), &geom).unwrap();
                r.sampled_type == BsdfType::SPECULAR_REFLECTION
            })
            .count();
        assert!(approx_eq!(f64, reflected as Float / n as Float, fr, epsilon = 2.0 / n as Float));
    }

    proptest! {
        #[test]
        fn sampled_pdf_matches_evaluated_pdf(
            cos_i in -1.0..1.0f64,
            phi in 0.0..6.28f64,
            u_comp in 0.0..1.0f64,
        ) {
            prop_assume!(cos_i.abs() > 0.01);
            let sin_i = (1.0 - cos_i * cos_i).sqrt();
            let wi = Vector3f::new(sin_i * phi.cos(), sin_i * phi.sin(), cos_i);
            let bsdf = glass();
            let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
            for dir in [TransportDirection::LE, TransportDirection::EL] {
                let q = query(dir, wi, u_comp);
                if let Some(result) = bsdf.sample_direction(&q, &geom) {
                    let pdf = bsdf.evaluate_direction_pdf(&BsdfEvalQuery::from_sample(&q, &result), &geom);
                    prop_assert_eq!(pdf.measure, result.pdf.measure);
                    prop_assert!(approx_eq!(f64, pdf.v, result.pdf.v, epsilon = 1e-6 * result.pdf.v.max(1.0)));
                }
            }
        }

        #[test]
        fn fresnel_is_symmetric_across_the_interface(cos_i in 0.05..1.0f64) {
            let (fr, cos_t) = fr_dielectric(cos_i, 1.0, 1.5);
            let (fr_rev, cos_t_rev) = fr_dielectric(cos_t, 1.5, 1.0);
            prop_assert!(approx_eq!(f64, fr, fr_rev, epsilon = 1e-9));
            prop_assert!(approx_eq!(f64, cos_t_rev, cos_i, epsilon = 1e-9));
        }
    }
}
