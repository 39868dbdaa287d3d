//! Thin Lens Camera

use crate::projective::*;
use core::bsdf::*;
use core::camera::*;
use core::error::*;
use core::geometry::*;
use core::light::*;
use core::lm::*;
use core::paramset::*;
use core::pdf::*;
use core::registry::*;
use core::sampling::*;
use core::spectrum::*;

/// Camera with a circular lens. Points on the plane of focus are sharp; the
/// rest of the scene is blurred according to the lens radius.
#[derive(Clone, Debug)]
pub struct ThinLensCamera {
    /// Projection and placement.
    pub data: ProjectiveCameraData,

    /// Radius of the lens.
    pub lens_radius: Float,

    /// Distance to the plane of focus.
    pub focal_distance: Float,
}

impl ThinLensCamera {
    /// Create a new thin lens camera at the origin looking down -z.
    ///
    /// * `data`           - Projection.
    /// * `lens_radius`    - Radius of the lens.
    /// * `focal_distance` - Distance to the plane of focus.
    pub fn new(data: ProjectiveCameraData, lens_radius: Float, focal_distance: Float) -> Self {
        Self {
            data,
            lens_radius,
            focal_distance,
        }
    }

    fn lens_area(&self) -> Float {
        PI * self.lens_radius * self.lens_radius
    }

    /// Returns the camera space point where a ray from the lens crosses the
    /// plane of focus.
    ///
    /// * `p_lens` - Camera space point on the lens.
    /// * `d`      - Unit camera space direction.
    fn focus_point(&self, p_lens: &Vector3f, d: &Vector3f) -> Option<Vector3f> {
        if d.z >= 0.0 {
            return None;
        }
        let t = (-self.focal_distance - p_lens.z) / d.z;
        Some(*p_lens + *d * t)
    }

    /// Returns the camera space direction of `wo` leaving the lens at `geom`
    /// if the camera sees it.
    fn visible_direction(
        &self,
        bsdf_type: BsdfType,
        dir: TransportDirection,
        geom: &SurfaceGeometry,
        wo: &Vector3f,
    ) -> Option<Vector3f> {
        if !bsdf_type.matches(BsdfType::EYE_DIRECTION) || dir != TransportDirection::EL {
            return None;
        }
        let p_lens = self.data.world_to_camera.transform_point(&geom.p);
        let d = self.data.world_to_camera.transform_vector(wo).normalize();
        let p_focus = self.focus_point(&p_lens, &d)?;
        self.data.camera_to_raster(&p_focus).map(|_| d)
    }
}

impl GeneralizedBsdf for ThinLensCamera {
    fn bsdf_types(&self) -> BsdfType {
        BsdfType::EYE_DIRECTION
    }

    fn sample_direction(&self, query: &BsdfSampleQuery, geom: &SurfaceGeometry) -> Option<BsdfSampleResult> {
        if !query.bsdf_type.matches(BsdfType::EYE_DIRECTION) || query.transport_dir != TransportDirection::EL {
            return None;
        }

        // Aim at the point on the plane of focus seen through the raster
        // position.
        let p_lens = self.data.world_to_camera.transform_point(&geom.p);
        let p_focus = self.data.raster_to_camera(&query.sample) * self.focal_distance;
        let d = (p_focus - p_lens).normalize();
        Some(BsdfSampleResult {
            sampled_type: BsdfType::EYE_DIRECTION,
            wo: self.data.camera_to_world.transform_vector(&d).normalize(),
            pdf: PdfEval::new(self.data.importance(&d, 4), ProbabilityMeasure::ProjectedSolidAngle),
        })
    }

    fn evaluate_direction(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> Spectrum {
        match self.visible_direction(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            Some(d) => Spectrum::splat(self.data.importance(&d, 4)),
            None => Spectrum::ZERO,
        }
    }

    fn evaluate_direction_pdf(&self, query: &BsdfEvalQuery, geom: &SurfaceGeometry) -> PdfEval {
        match self.visible_direction(query.bsdf_type, query.transport_dir, geom, &query.wo) {
            Some(d) => PdfEval::new(self.data.importance(&d, 4), ProbabilityMeasure::ProjectedSolidAngle),
            None => PdfEval::zero(ProbabilityMeasure::ProjectedSolidAngle),
        }
    }
}

impl Emitter for ThinLensCamera {
    fn sample_position(&self, sample: &Vector2f) -> Option<(SurfaceGeometry, PdfEval)> {
        let d = concentric_sample_disk(sample) * self.lens_radius;
        let p = self.data.camera_to_world.transform_point(&Vector3f::new(d.x, d.y, 0.0));
        Some((
            SurfaceGeometry::with_normal(p, self.data.forward()),
            PdfEval::new(1.0 / self.lens_area(), ProbabilityMeasure::Area),
        ))
    }

    fn evaluate_position(&self, _geom: &SurfaceGeometry) -> Spectrum {
        Spectrum::splat(1.0 / self.lens_area())
    }

    fn evaluate_position_pdf(&self, _geom: &SurfaceGeometry) -> PdfEval {
        PdfEval::new(1.0 / self.lens_area(), ProbabilityMeasure::Area)
    }

    fn as_generalized_bsdf(&self) -> &dyn GeneralizedBsdf {
        self
    }
}

impl Camera for ThinLensCamera {
    fn register_transform(&mut self, camera_to_world: &Transform) {
        self.data.set_transform(camera_to_world);
    }

    fn ray_to_raster(&self, p: &Vector3f, d: &Vector3f) -> Option<Vector2f> {
        let p_lens = self.data.world_to_camera.transform_point(p);
        let d = self.data.world_to_camera.transform_vector(d).normalize();
        let p_focus = self.focus_point(&p_lens, &d)?;
        self.data.camera_to_raster(&p_focus)
    }
}

/// Create a thin lens camera from parameters.
///
/// * `params`    - Parameter set; `lens_radius` defaults to 0.1 and
///                 `focal_distance` to 1, in addition to the projection
///                 parameters.
/// * `_registry` - Unused.
pub fn create_thin_lens_camera(params: &ParamSet, _registry: &ComponentRegistry) -> Result<Box<dyn Camera>> {
    let data = projective_camera_data_from_params(params)?;
    let lens_radius = params.find_one_positive_float("lens_radius", 0.1)?;
    let focal_distance = params.find_one_positive_float("focal_distance", 1.0)?;
    Ok(Box::new(ThinLensCamera::new(data, lens_radius, focal_distance)))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    fn camera() -> ThinLensCamera {
        let mut camera = ThinLensCamera::new(ProjectiveCameraData::new(60.0, 1.5).unwrap(), 0.2, 4.0);
        camera.register_transform(&Transform::translate(&Vector3f::new(1.0, 0.0, 0.0)));
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
    fn rays_through_one_raster_position_meet_on_the_focal_plane() {
        let camera = camera();
        let q = query(Vector2f::new(0.3, 0.6));
        let mut foci = vec![];
        for lens in &[Vector2f::new(0.1, 0.2), Vector2f::new(0.9, 0.5), Vector2f::new(0.5, 0.5)] {
            let (geom, _) = camera.sample_position(lens).unwrap();
            let result = camera.sample_direction(&q, &geom).unwrap();
            let t = -4.0 / result.wo.z;
            foci.push(geom.p + result.wo * t);
        }
        assert!((foci[0] - foci[1]).length() < 1e-9);
        assert!((foci[0] - foci[2]).length() < 1e-9);
    }

    #[test]
    fn sampling_weights_are_one() {
        let camera = camera();
        let (geom, pdf_p) = camera.sample_position(&Vector2f::new(0.7, 0.2)).unwrap();
        assert_eq!(pdf_p.measure, ProbabilityMeasure::Area);
        let wp = camera.evaluate_position(&geom)[0] / pdf_p.v;
        assert!(approx_eq!(f64, wp, 1.0, epsilon = 1e-12));

        let (_, weight) = camera
            .sample_and_estimate_direction(&query(Vector2f::new(0.2, 0.9)), &geom)
            .unwrap();
        assert!(approx_eq!(f64, weight[0], 1.0, epsilon = 1e-9));
    }

    proptest! {
        #[test]
        fn lens_positions_lie_on_the_aperture(u in 0.0..1.0f64, v in 0.0..1.0f64) {
            let camera = camera();
            let (geom, pdf) = camera.sample_position(&Vector2f::new(u, v)).unwrap();
            prop_assert!(approx_eq!(f64, geom.p.z, 0.0, epsilon = 1e-12));
            prop_assert!(geom.p.distance(&Vector3f::new(1.0, 0.0, 0.0)) <= 0.2 + 1e-12);
            prop_assert!(approx_eq!(f64, pdf.v, 1.0 / (PI * 0.04), epsilon = 1e-9));
            prop_assert!((geom.gn + Vector3f::Z).length() < 1e-12);
        }

        #[test]
        fn raster_of_sampled_ray_is_the_sample(
            a in 0.0..1.0f64,
            b in 0.0..1.0f64,
            u in 0.01..0.99f64,
            v in 0.01..0.99f64,
        ) {
            let camera = camera();
            let (geom, _) = camera.sample_position(&Vector2f::new(a, b)).unwrap();
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
