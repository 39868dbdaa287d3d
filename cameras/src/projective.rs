//! Projective Camera Data

use core::error::*;
use core::geometry::*;
use core::lm::*;
use core::paramset::*;

/// Near plane distance of the projection.
const NEAR: Float = 1e-2;

/// Far plane distance of the projection.
const FAR: Float = 1000.0;

/// Transformations shared by cameras that project the scene onto a planar
/// image. Raster coordinates are in [0, 1]^2 with (0, 0) at the bottom left.
#[derive(Clone, Debug)]
pub struct ProjectiveCameraData {
    /// Camera to world transformation.
    pub camera_to_world: Transform,

    /// World to camera transformation.
    pub world_to_camera: Transform,

    /// Camera space to normalized device coordinates.
    pub camera_to_ndc: Transform,

    /// Normalized device coordinates to camera space.
    pub ndc_to_camera: Transform,

    /// Area of the image plane at distance 1.
    pub image_plane_area: Float,
}

impl ProjectiveCameraData {
    /// Create the projection for a vertical field of view.
    ///
    /// * `fovy`   - Vertical field of view in degrees.
    /// * `aspect` - Width / height of the image.
    pub fn new(fovy: Float, aspect: Float) -> Result<Self> {
        let camera_to_ndc = Transform::perspective(fovy, aspect, NEAR, FAR)
            .ok_or_else(|| Error::config(format!("degenerate projection (fovy {}, aspect {})", fovy, aspect)))?;
        let ndc_to_camera = camera_to_ndc.inverse();

        // Compute the image plane bounds at z = -1.
        let mut data = Self {
            camera_to_world: Transform::IDENTITY,
            world_to_camera: Transform::IDENTITY,
            camera_to_ndc,
            ndc_to_camera,
            image_plane_area: 0.0,
        };
        let p_min = data.raster_to_camera(&Vector2f::new(0.0, 0.0));
        let p_max = data.raster_to_camera(&Vector2f::new(1.0, 1.0));
        data.image_plane_area = abs((p_max.x - p_min.x) * (p_max.y - p_min.y));
        Ok(data)
    }

    /// Set the camera placement.
    ///
    /// * `camera_to_world` - Camera to world transformation.
    pub fn set_transform(&mut self, camera_to_world: &Transform) {
        self.camera_to_world = *camera_to_world;
        self.world_to_camera = camera_to_world.inverse();
    }

    /// Returns the camera position in world space.
    pub fn position(&self) -> Vector3f {
        self.camera_to_world.transform_point(&Vector3f::ZERO)
    }

    /// Returns the viewing direction in world space.
    pub fn forward(&self) -> Vector3f {
        self.camera_to_world.transform_vector(&-Vector3f::Z).normalize()
    }

    /// Returns the camera space point on the image plane at z = -1 for a
    /// raster position.
    ///
    /// * `raster` - Raster position in [0, 1]^2.
    pub fn raster_to_camera(&self, raster: &Vector2f) -> Vector3f {
        let ndc = Vector3f::new(2.0 * raster.x - 1.0, 2.0 * raster.y - 1.0, 0.0);
        let (p, _) = self.ndc_to_camera.transform_point_projective(&ndc);
        p / -p.z
    }

    /// Returns the raster position of a camera space point in front of the
    /// camera, or `None` if it projects outside the image.
    ///
    /// * `p` - Camera space point.
    pub fn camera_to_raster(&self, p: &Vector3f) -> Option<Vector2f> {
        if p.z >= 0.0 {
            return None;
        }
        let (ndc, _) = self.camera_to_ndc.transform_point_projective(p);
        let raster = Vector2f::new((ndc.x + 1.0) * 0.5, (ndc.y + 1.0) * 0.5);
        if (0.0..=1.0).contains(&raster.x) && (0.0..=1.0).contains(&raster.y) {
            Some(raster)
        } else {
            None
        }
    }

    /// Returns the importance of a unit camera space direction in projected
    /// solid angle. The image plane density at distance 1 is converted with
    /// `cos^power`, where `power` is 3 for a pinhole whose positional cosine
    /// is 1 and 4 for a lens with an oriented surface.
    ///
    /// * `d`     - Unit camera space direction.
    /// * `power` - Cosine exponent.
    pub fn importance(&self, d: &Vector3f, power: i32) -> Float {
        let cos = -d.z;
        if cos <= 0.0 {
            return 0.0;
        }
        1.0 / (self.image_plane_area * cos.powi(power))
    }
}

/// Read the parameters shared by projective cameras and build the
/// projection.
///
/// * `params` - Parameter set; `fovy` (degrees) defaults to 45, `aspect`
///              defaults to 1.
pub fn projective_camera_data_from_params(params: &ParamSet) -> Result<ProjectiveCameraData> {
    let fovy = params.find_one_positive_float("fovy", 45.0)?;
    if fovy >= 180.0 {
        return Err(Error::config(format!("field of view {} must be below 180 degrees", fovy)));
    }
    let aspect = params.find_one_positive_float("aspect", 1.0)?;
    ProjectiveCameraData::new(fovy, aspect)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn image_plane_matches_field_of_view() {
        let data = ProjectiveCameraData::new(90.0, 2.0).unwrap();
        assert!(approx_eq!(f64, data.image_plane_area, 8.0, epsilon = 1e-9));

        let corner = data.raster_to_camera(&Vector2f::new(1.0, 1.0));
        assert!(approx_eq!(f64, corner.x, 2.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, corner.y, 1.0, epsilon = 1e-9));
        assert!(approx_eq!(f64, corner.z, -1.0, epsilon = 1e-12));
    }

    #[test]
    fn raster_round_trip() {
        let data = ProjectiveCameraData::new(60.0, 1.5).unwrap();
        let raster = Vector2f::new(0.25, 0.8);
        let p = data.raster_to_camera(&raster) * 3.0;
        let back = data.camera_to_raster(&p).unwrap();
        assert!(approx_eq!(f64, back.x, raster.x, epsilon = 1e-9));
        assert!(approx_eq!(f64, back.y, raster.y, epsilon = 1e-9));
    }

    #[test]
    fn points_behind_or_outside_are_rejected() {
        let data = ProjectiveCameraData::new(60.0, 1.0).unwrap();
        assert!(data.camera_to_raster(&Vector3f::new(0.0, 0.0, 1.0)).is_none());
        assert!(data.camera_to_raster(&Vector3f::new(10.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn wide_field_of_view_is_rejected() {
        let params = ParamSet::new().with_float("fovy", 180.0);
        assert!(projective_camera_data_from_params(&params).is_err());
    }
}
