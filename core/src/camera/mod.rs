//! Camera

use crate::geometry::*;
use crate::light::Emitter;
use std::sync::Arc;
use crate::registry::Component;

/// A camera is an emitter of importance. Positions are sampled on the
/// aperture and directions leave it through the image plane.
pub trait Camera: Emitter {
    /// Place the camera. The camera looks down its local -z axis with +y up.
    ///
    /// * `camera_to_world` - Camera to world transformation.
    fn register_transform(&mut self, camera_to_world: &Transform);

    /// Returns the raster position in [0, 1]^2 of a ray leaving the aperture
    /// at `p` in direction `d`, or `None` if it misses the image plane.
    ///
    /// * `p` - Point on the aperture.
    /// * `d` - Direction.
    fn ray_to_raster(&self, p: &Vector3f, d: &Vector3f) -> Option<Vector2f>;
}

/// Atomic reference counted `Camera`.
pub type ArcCamera = Arc<dyn Camera>;

impl Component for dyn Camera {
    const INTERFACE: &'static str = "camera";
}
