//! Diffuse Area Light

use core::bsdf::*;
use core::error::*;
use core::geometry::*;
use core::light::*;
use core::lm::*;
use core::mesh::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::sampling::*;
use core::spectrum::*;
use core::{stat_counter, stat_inc, stat_register_fns};

stat_counter!("Lights/Degenerate emitting triangles", N_DEGENERATE, area_light_stats_degenerate);
stat_register_fns!(area_light_stats_degenerate);

/// Uniform diffuse emission from the front side of triangle meshes.
#[derive(Clone, Debug)]
pub struct AreaLight {
    /// Emitted radiance.
    pub le: Spectrum,

    /// World space triangles.
    triangles: Vec<[Vector3f; 3]>,

    /// Triangle selection proportional to area.
    distribution: DiscreteDistribution1D,

    /// Total area.
    area: Float,
}

impl AreaLight {
    /// Create a new `AreaLight` with no surface. Meshes are bound with
    /// `register_meshes()`.
    ///
    /// * `le` - Emitted radiance.
    pub fn new(le: Spectrum) -> Self {
        Self {
            le,
            triangles: vec![],
            distribution: DiscreteDistribution1D::new(),
            area: 0.0,
        }
    }

    /// Returns the total emitting area.
    pub fn area(&self) -> Float {
        self.area
    }

    /// Returns `true` if the light emits towards `wo`.
    fn emits(&self, bsdf_type: BsdfType, dir: TransportDirection, geom: &SurfaceGeometry, wo: &Vector3f) -> bool {
        bsdf_type.matches(BsdfType::LIGHT_DIRECTION)
            && dir == TransportDirection::LE
            && cos_theta_z_up(&geom.to_shading(wo)) > 0.0
    }
}

impl GeneralizedBsdf for AreaLight {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::LIGHT_DIRECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::LIGHT_DIRECTION) || query.transport_dir != TransportDirection::LE {
            return None;
        }
        let local_wo = cosine_sample_hemisphere(&query.sample);
        Some(BsdfSampleResult {
            sampled_type: BsdfType::LIGHT_DIRECTION,
            wo: geom.to_world(&local_wo),
            pdf: cosine_hemisphere_pdf_projected(),
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Spectrum {
        if self.emits(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            Spectrum::splat(INV_PI)
        } else {
            Spectrum::ZERO
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        if self.emits(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            cosine_hemisphere_pdf_projected()
        } else {
            PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle)
        }
    }
}

impl Emitter for AreaLight {
    fn sample_position(&self, sample: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)> {
        if self.triangles.is_empty() {
            return None;
        }
        let (i, v) = self.distribution.sample_reuse(sample.y);
        let [p0, p1, p2] = self.triangles[i];
        let b = uniform_sample_triangle(&Vector2f::new(sample.x, v));
        let p = p0 * (1.0 - b.x - b.y) + p1 * b.x + p2 * b.y;
        let gn = (p1 - p0).cross(&(p2 - p0)).normalize();
        Some((
            SurfaceGeometry::new(p, gn, gn, b),
            PdfEval::new(1.0 / self.area, ProbabilityMeasure::Area),
        ))
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Spectrum {
        self.le * PI
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        if self.area > 0.0 {
            PdfEval::new(1.0 / self.area, ProbabilityMeasure::Area)
        } else {
            PdfEval::zero(ProbabilityMeasure::Area)
        }
    }

    fn as_generalized_bsdf(&self) -> &dyn GeneralizedBsdf {
        self
    }
}

impl Light for AreaLight {
    fn power(&self) -> Float {
        self.le.luminance() * PI * self.area
    }

    fn register_meshes(&mut self, meshes: &[(&TriangleMesh, &Transform)]) -> Result<()> {
        register_stats();

        self.triangles.clear();
        self.distribution.clear();
        for (mesh, transform) in meshes.iter() {
            for face in 0..mesh.num_faces() {
                let tri = mesh.world_triangle(face, transform);
                let area = triangle_area(&tri);
                if area > 0.0 {
                    self.triangles.push(tri);
                    self.distribution.add(area);
                } else {
                    stat_inc!(N_DEGENERATE, 1);
                }
            }
        }

        self.area = self.distribution.normalize();
        if self.area <= 0.0 {
            return Err(Error::config("area light is bound to no emitting surface"));
        }
        debug!(
            "Area light bound to {} triangles with total area {}",
            self.triangles.len(),
            self.area
        );
        Ok(())
    }
}

/// Create an area light from parameters.
///
/// * `params`    - Parameter set; `luminance` is required.
/// * `_registry` - Unused.
pub fn create_area_light(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Light>> {
    let le = params.get_spectrum("luminance")?;
    if le.has_negative() {
        return Err(Error::config(format!("negative luminance {}", le)));
    }
    Ok(Box::new(AreaLight::new(le)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    /// A 2x1 rectangle in the z = 1 plane facing -z.
    fn light() -> AreaLight {
        let mesh = TriangleMesh::from_polygons(
            vec![
                Vector3f::new(0.0, 0.0, 1.0),
                Vector3f::new(0.0, 1.0, 1.0),
                Vector3f::new(2.0, 1.0, 1.0),
                Vector3f::new(2.0, 0.0, 1.0),
            ],
            vec![],
            vec![],
            &[vec![0, 1, 2, 3]],
        )
        .unwrap();
        let mut light = AreaLight::new(Spectrum::splat(2.0));
        light.register_meshes(&[(&mesh, &Transform::IDENTITY)]).unwrap();
        light
    }

    #[test]
    fn power_is_radiance_times_pi_area() {
        let light = light();
        assert!(approx_eq!(f64, light.area(), 2.0, epsilon = 1e-12));
        assert!(approx_eq!(f64, light.power(), 2.0 * PI * 2.0, epsilon = 1e-9));
    }

    #[test]
    fn unbound_light_is_rejected() {
        let mut light = AreaLight::new(Spectrum::ONE);
        assert!(light.register_meshes(&[]).is_err());
        assert!(light.sample_position(&Vector2f::new(0.5, 0.5)).is_none());
    }

    #[test]
    fn emits_only_in_light_direction() {
        let light = light();
        let (geom, _) = light.sample_position(&Vector2f::new(0.3, 0.6)).unwrap();
        let down = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, Vector3f::ZERO, -Vector3f::Z);
        let up = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, Vector3f::ZERO, Vector3f::Z);
        let eye = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, Vector3f::ZERO, -Vector3f::Z);
        assert!(approx_eq!(f64, light.evaluate_direction(&down, &geom)[0], INV_PI, epsilon = 1e-12));
        assert!(light.evaluate_direction(&up, &geom).is_black());
        assert!(light.evaluate_direction(&eye, &geom).is_black());
    }

    proptest! {
        #[test]
        fn sampled_positions_lie_on_the_surface(u in 0.0..1.0f64, v in 0.0..1.0f64) {
            let light = light();
            let (geom, pdf) = light.sample_position(&Vector2f::new(u, v)).unwrap();
            prop_assert!(approx_eq!(f64, geom.p.z, 1.0, epsilon = 1e-12));
            prop_assert!(geom.p.x >= -1e-12 && geom.p.x <= 2.0 + 1e-12);
            prop_assert!(geom.p.y >= -1e-12 && geom.p.y <= 1.0 + 1e-12);
            prop_assert_eq!(pdf.measure, ProbabilityMeasure::Area);
            prop_assert!(approx_eq!(f64, pdf.v, 0.5, epsilon = 1e-12));
            prop_assert!(approx_eq!(f64, light.evaluate_position_pdf(&geom).v, pdf.v, epsilon = 1e-12));
        }

        #[test]
        fn sampled_directions_leave_the_front_side(u in 0.0..1.0f64, v in 0.0..1.0f64) {
            let light = light();
            let (geom, _) = light.sample_position(&Vector2f::new(0.5, 0.5)).unwrap();
            let q = BsdfSampleQuery {
                bsdf_type: BsdfType::LIGHT_DIRECTION,
                sample: Vector2f::new(u, v),
                u_comp: 0.0,
                transport_dir: TransportDirection::LE,
                wi: Vector3f::ZERO,
            };
            let result = light.sample_direction(&q, &geom).unwrap();
            prop_assert!(result.wo.z <= 0.0);
            prop_assert!(approx_eq!(f64, result.pdf.v, INV_PI, epsilon = 1e-12));
        }
    }
}
