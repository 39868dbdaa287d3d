//! Generalized BSDF
//!
//! Surface scattering and the directional part of emitters share one
//! interface so that path sampling treats every vertex the same way.
//! Direction densities are expressed in the projected solid angle measure.

use crate::geometry::*;
use crate::lm::*;
use crate::pdf::*;
use crate::spectrum::*;
use std::sync::Arc;
use crate::registry::Component;

mod bsdf_type;
mod transport_direction;

// Re-export
pub use bsdf_type::*;
pub use transport_direction::*;

/// Query for `GeneralizedBsdf::sample_direction()`.
#[derive(Copy, Clone, Debug)]
pub struct BsdfSampleQuery {
    /// Allowed components.
    pub bsdf_type: BsdfType,

    /// Uniform random numbers for the direction.
    pub sample: Vector2f,

    /// Uniform random number for component selection.
    pub u_comp: Float,

    /// Transport direction of the subpath.
    pub transport_dir: TransportDirection,

    /// Incoming direction in world space, pointing away from the surface.
    /// Ignored by emitters.
    pub wi: Vector3f,
}

/// Result of `GeneralizedBsdf::sample_direction()`.
#[derive(Copy, Clone, Debug)]
pub struct BsdfSampleResult {
    /// Sampled component.
    pub sampled_type: BsdfType,

    /// Outgoing direction in world space.
    pub wo: Vector3f,

    /// Density of `wo`.
    pub pdf: PdfEval,
}

/// Result of `GeneralizedBsdf::sample_and_estimate_direction_bidir()`. Values
/// are indexed by transport direction: the entry for the query direction
/// describes `wi → wo`, the opposite entry describes `wo → wi`.
#[derive(Copy, Clone, Debug)]
pub struct BsdfSampleBidirResult {
    /// Sampled component.
    pub sampled_type: BsdfType,

    /// Outgoing direction in world space.
    pub wo: Vector3f,

    /// Estimates f / pdf.
    pub weight: PerDirection<Spectrum>,

    /// Densities.
    pub pdf: PerDirection<PdfEval>,
}

/// Query for `GeneralizedBsdf::evaluate_direction()` and
/// `GeneralizedBsdf::evaluate_direction_pdf()`.
#[derive(Copy, Clone, Debug)]
pub struct BsdfEvalQuery {
    /// Components to evaluate.
    pub bsdf_type: BsdfType,

    /// Transport direction.
    pub transport_dir: TransportDirection,

    /// Incoming direction in world space.
    pub wi: Vector3f,

    /// Outgoing direction in world space.
    pub wo: Vector3f,
}

impl BsdfEvalQuery {
    /// Create a query.
    ///
    /// * `bsdf_type`     - Components to evaluate.
    /// * `transport_dir` - Transport direction.
    /// * `wi`            - Incoming direction.
    /// * `wo`            - Outgoing direction.
    pub fn new(bsdf_type: BsdfType, transport_dir: TransportDirection, wi: Vector3f, wo: Vector3f) -> Self {
        Self {
            bsdf_type,
            transport_dir,
            wi,
            wo,
        }
    }

    /// Create a query that evaluates a sampled direction under the component
    /// mask it was sampled with.
    ///
    /// * `query`  - The sampling query.
    /// * `result` - The sampled result.
    pub fn from_sample(query: &BsdfSampleQuery, result: &BsdfSampleResult) -> Self {
        Self::new(query.bsdf_type, query.transport_dir, query.wi, result.wo)
    }

    /// Returns the same query traced in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self::new(self.bsdf_type, self.transport_dir.opposite(), self.wo, self.wi)
    }
}

/// Directional scattering at a surface point. Implemented by materials and by
/// the directional part of lights and cameras.
pub trait GeneralizedBsdf: Send + Sync {
    /// Returns the components the model can produce.
    fn bsdf_types(&self) -> BsdfType;

    /// Sample an outgoing direction. Returns `None` if the query mask excludes
    /// every component available for `wi`.
    ///
    /// * `query` - The query.
    /// * `geom`  - Surface geometry.
    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult>;

    /// Evaluate the generalized BSDF f(wi → wo) times the shading normal
    /// correction factor.
    ///
    /// * `query` - The query.
    /// * `geom`  - Surface geometry.
    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Spectrum;

    /// Evaluate the density `sample_direction()` would produce for `wo`.
    ///
    /// * `query` - The query.
    /// * `geom`  - Surface geometry.
    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval;

    /// Returns true if the directional distribution is a Dirac delta.
    fn degenerated(&self) -> bool {
        false
    }

    /// Sample a direction and return f / pdf alongside the sample. Returns
    /// `None` when sampling fails or the estimate is zero.
    ///
    /// * `query` - The query.
    /// * `geom`  - Surface geometry.
    fn sample_and_estimate_direction(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<(BsdfSampleResult, Spectrum)> {
        let result = self.sample_direction(query, geom)?;
        if result.pdf.is_zero() {
            return None;
        }
        let f = self.evaluate_direction(&BsdfEvalQuery::from_sample(query, &result), geom);
        if f.is_black() {
            None
        } else {
            Some((result, f / result.pdf.v))
        }
    }

    /// Sample a direction and evaluate estimates and densities for both
    /// transport directions. Returns `None` when either direction yields a
    /// zero estimate.
    ///
    /// * `query` - The query.
    /// * `geom`  - Surface geometry.
    fn sample_and_estimate_direction_bidir(
        &self,
        query: &BsdfSampleQuery,
        geom: &SurfaceGeometry,
    ) -> Option<BsdfSampleBidirResult> {
        let result = self.sample_direction(query, geom)?;
        let fwd = BsdfEvalQuery::from_sample(query, &result);
        let rev = fwd.reversed();
        let pdf_rev = self.evaluate_direction_pdf(&rev, geom);
        if result.pdf.is_zero() || pdf_rev.is_zero() {
            return None;
        }

        let f = self.evaluate_direction(&fwd, geom);
        let f_rev = self.evaluate_direction(&rev, geom);
        if f.is_black() || f_rev.is_black() {
            return None;
        }

        let dir = query.transport_dir;
        let mut weight = PerDirection::default();
        let mut pdf = PerDirection::default();
        weight[dir] = f / result.pdf.v;
        weight[dir.opposite()] = f_rev / pdf_rev.v;
        pdf[dir] = result.pdf;
        pdf[dir.opposite()] = pdf_rev;

        Some(BsdfSampleBidirResult {
            sampled_type: result.sampled_type,
            wo: result.wo,
            weight,
            pdf,
        })
    }
}

/// Atomic reference counted `GeneralizedBsdf`.
pub type ArcBsdf = Arc<dyn GeneralizedBsdf>;

impl Component for dyn GeneralizedBsdf {
    const INTERFACE: &'static str = "bsdf";
}

/// Shading normal correction factor. Returns 0 when `wi` or `wo` lies on
/// different sides of the surface with respect to the geometric and the
/// shading normal, which prevents light leaks. For `LE` traces the factor is
/// |wi·sn| |wo·gn| / (|wo·sn| |wi·gn|), for `EL` it is 1.
///
/// * `transport_dir` - Transport direction.
/// * `geom`          - Surface geometry.
/// * `local_wi`      - `wi` in shading coordinates.
/// * `local_wo`      - `wo` in shading coordinates.
/// * `wi`            - `wi` in world space.
/// * `wo`            - `wo` in world space.
pub fn shading_normal_correction_factor(
    transport_dir: TransportDirection,
    geom: &SurfaceGeometry,
    local_wi: &Vector3f,
    local_wo: &Vector3f,
    wi: &Vector3f,
    wo: &Vector3f,
) -> Float {
    let wi_dot_ng = wi.dot(&geom.gn);
    let wo_dot_ng = wo.dot(&geom.gn);
    let wi_dot_ns = cos_theta_z_up(local_wi);
    let wo_dot_ns = cos_theta_z_up(local_wo);
    if wi_dot_ng * wi_dot_ns <= 0.0 || wo_dot_ng * wo_dot_ns <= 0.0 {
        return 0.0;
    }

    // wo is always the propagating direction.
    if transport_dir == TransportDirection::LE {
        wi_dot_ns * wo_dot_ng / (wo_dot_ns * wi_dot_ng)
    } else {
        1.0
    }
}

/// Returns true if two unit directions agree within `EPS_LARGE`.
///
/// * `a` - First direction.
/// * `b` - Second direction.
#[inline]
pub fn same_direction(a: &Vector3f, b: &Vector3f) -> bool {
    (*a - *b).abs().max_component() < EPS_LARGE
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn correction_factor_is_one_without_shading_normals() {
        let geom = SurfaceGeometry::with_normal(Vector3f::ZERO, Vector3f::Z);
        let wi = Vector3f::new(0.3, 0.0, 1.0).normalize();
        let wo = Vector3f::new(-0.5, 0.2, 1.0).normalize();
        let (lwi, lwo) = (geom.to_shading(&wi), geom.to_shading(&wo));
        for dir in [TransportDirection::LE, TransportDirection::EL] {
            let sf = shading_normal_correction_factor(dir, &geom, &lwi, &lwo, &wi, &wo);
            assert!(approx_eq!(f64, sf, 1.0, epsilon = 1e-12));
        }
    }

    #[test]
    fn correction_factor_blocks_light_leaks() {
        // Shading normal tilted so wo is above the shading plane but below the
        // geometric plane.
        let sn = Vector3f::new(1.0, 0.0, 1.0).normalize();
        let geom = SurfaceGeometry::new(Vector3f::ZERO, Vector3f::Z, sn, Vector2f::zero());
        let wi = Vector3f::Z;
        let wo = Vector3f::new(1.0, 0.0, -0.2).normalize();
        let (lwi, lwo) = (geom.to_shading(&wi), geom.to_shading(&wo));
        assert!(lwo.z > 0.0);
        let sf = shading_normal_correction_factor(TransportDirection::EL, &geom, &lwi, &lwo, &wi, &wo);
        assert_eq!(sf, 0.0);
    }

    #[test]
    fn type_mask_helpers() {
        assert!(BsdfType::SPECULAR_REFLECTION.is_specular());
        assert!(!BsdfType::DIFFUSE_REFLECTION.is_specular());
        assert!(BsdfType::ALL.matches(BsdfType::EYE_DIRECTION));
        assert!(!BsdfType::ALL_BSDF.matches(BsdfType::LIGHT_DIRECTION));
    }

    #[test]
    fn per_direction_indexing() {
        let mut v = PerDirection([0, 0]);
        v[TransportDirection::EL] = 3;
        assert_eq!(v.0, [0, 3]);
        assert_eq!(TransportDirection::LE.opposite(), TransportDirection::EL);
    }
}
