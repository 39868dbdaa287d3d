//! Perspective Camera

use crate::projective::*;
use core::bsdf::*;
use core::camera::*;
use core::error::*;
use core::geometry::*;
use core::light::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::spectrum::*;

/// Pinhole camera. The aperture is a single point, so positions are sampled
/// with a discrete probability of 1.
#[derive(Clone, Debug)]
pub struct PerspectiveCamera {
    /// Projection and placement.
    pub data: ProjectiveCameraData,
}

impl PerspectiveCamera {
    /// Create a new perspective camera at the origin looking down -z.
    ///
    /// * `data` - Projection.
    pub fn new(data: ProjectiveCameraData) -> Self {
        Self { data }
    }

    /// Returns the camera space direction of `wo` if the camera sees it.
    fn visible_direction(&self, bsdf_type: BsdfType, dir: TransportDirection, wo: &Vector3f) -> Option<Vector3f> {
        if !bsdf_type.matches(BsdfType::EYE_DIRECTION) || dir != TransportDirection::EL {
            return None;
        }
        let d = self.data.world_to_camera.transform_vector(wo).normalize();
        self.data.camera_to_raster(&d).map(|_| d)
    }
}

impl GeneralizedBsdf for PerspectiveCamera {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::EYE_DIRECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, _geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::EYE_DIRECTION) || query.transport_dir != TransportDirection::EL {
            return None;
        }

        // The sample is the raster position.
        let d = self.data.raster_to_camera(&query.sample).normalize();
        Some(BsdfSampleResult {
            sampled_type: BsdfType::EYE_DIRECTION,
            wo: self.data.camera_to_world.transform_vector(&d).normalize(),
            pdf: PdfEval::new(self.data.importance(&d, 3), ProbabilityMeasure::ProjectedSolidAngle),
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> Spectrum {
        match self.visible_direction(query.bsdf_type, query.transport_dir, &query.wo) {
            Some(d) => Spectrum::splat(self.data.importance(&d, 3)),
            None => Spectrum::ZERO,
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, _geom: &SurfaceGeometry) -> PdfEval {
        match self.visible_direction(query.bsdf_type, query.transport_dir, &query.wo) {
            Some(d) => PdfEval::new(self.data.importance(&d, 3), ProbabilityMeasure::ProjectedSolidAngle),
            None => PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle),
        }
    }
}

impl Emitter for PerspectiveCamera {
    fn sample_position(&self, _sample: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)> {
        Some((
            SurfaceGeometry::degenerated(self.data.position()),
            PdfEval::new(1.0, ProbabilityMeasure::Discrete),
        ))
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Spectrum {
        Spectrum::ONE
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        PdfEval::new(1.0, ProbabilityMeasure::Discrete)
    }

    fn as_generalized_bsdf(&self) -> &dyn GeneralizedBsdf {
        self
    }
}

impl Camera for PerspectiveCamera {
    fn register_transform(&mut self, camera_to_world: &Transform) {
        self.data.set_transform(camera_to_world);
    }

    fn ray_to_raster(&self, _p: &Vector3f, d: &Vector3f) -> Option<Vector2f> {
        let d = self.data.world_to_camera.transform_vector(d);
        self.data.camera_to_raster(&d)
    }
}

/// Create a perspective camera from parameters.
///
/// * `params`    - Parameter set; see `projective_camera_data_from_params()`.
/// * `_registry` - Unused.
pub fn create_perspective_camera(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Camera>> {
    let data = projective_camera_data_from_params(params)?;
    debug!("Perspective camera with image plane area {}", data.image_plane_area);
    Ok(Box::new(PerspectiveCamera::new(data)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(ProjectiveCameraData::new(90.0, 1.0).unwrap());
        camera.register_transform(&Transform::translate(&Vector3f::new(0.0, 1.0, 5.0)));
        camera
    }

    fn query(raster: Vector2f) -> BsdfSampleQuery {
        BsdfSampleQuery {
            bsdf_type: BsdfType::EYE_DIRECTION,
            sample: raster,
            u_comp: 0.0,
            transport_dir: TransportDirection::EL,
            wi: Vector3f::ZERO,
        }
    }

    #[test]
    fn center_ray_looks_down_the_axis() {
        let camera = camera();
        let (geom, pdf_p) = camera.sample_position(&Vector2f::new(0.3, 0.3)).unwrap();
        assert!(geom.degenerated);
        assert_eq!(pdf_p.measure, ProbabilityMeasure::Discrete);
        assert!((geom.p - Vector3f::new(0.0, 1.0, 5.0)).length() < 1e-12);

        let (result, weight) = camera
            .sample_and_estimate_direction(&query(Vector2f::new(0.5, 0.5)), &geom)
            .unwrap();
        assert!((result.wo + Vector3f::Z).length() < 1e-12);
        assert!(approx_eq!(f64, result.pdf.v, 0.25, epsilon = 1e-9));
        assert!(approx_eq!(f64, weight[0], 1.0, epsilon = 1e-9));
    }

    #[test]
    fn directions_outside_the_frustum_have_no_importance() {
        let camera = camera();
        let (geom, _) = camera.sample_position(&Vector2f::new(0.5, 0.5)).unwrap();
        let behind = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::EL, Vector3f::ZERO, Vector3f::Z);
        let wide = BsdfEvalQuery::new(
            BsdfType::ALL,
            TransportDirection::EL,
            Vector3f::ZERO,
            Vector3f::new(3.0, 0.0, -1.0).normalize(),
        );
        let light = BsdfEvalQuery::new(BsdfType::ALL, TransportDirection::LE, Vector3f::ZERO, -Vector3f::Z);
        assert!(camera.evaluate_direction(&behind, &geom).is_black());
        assert!(camera.evaluate_direction(&wide, &geom).is_black());
        assert!(camera.evaluate_direction(&light, &geom).is_black());
        assert!(camera.ray_to_raster(&geom.p, &Vector3f::Z).is_none());
    }

    proptest! {
        #[test]
        fn raster_of_sampled_ray_is_the_sample(u in 0.01..0.99f64, v in 0.01..0.99f64) {
            let camera = camera();
            let (geom, _) = camera.sample_position(&Vector2f::new(0.5, 0.5)).unwrap();
            let q = query(Vector2f::new(u, v));
            let result = camera.sample_direction(&q, &geom).unwrap();

            let raster = camera.ray_to_raster(&geom.p, &result.wo).unwrap();
            prop_assert!(approx_eq!(f64, raster.x, u, epsilon = 1e-9));
            prop_assert!(approx_eq!(f64, raster.y, v, epsilon = 1e-9));

            let pdf = camera.evaluate_direction_pdf(&BsdfEvalQuery::from_sample(&q, &result), &geom);
            prop_assert!(approx_eq!(f64, pdf.v, result.pdf.v, epsilon = 1e-9 * result.pdf.v));
        }
    }
}
