//! Cameras

#[macro_use]
extern crate log;

mod perspective;
mod projective;
mod thin_lens;

// Re-export
pub use perspective::*;
pub use projective::*;
pub use thin_lens::*;

use core::camera::Camera;
use core::registry::ComponentRegistry;

/// Register the cameras.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn Camera>("perspective", create_perspective_camera);
    registry.register::<dyn Camera>("thinlens", create_thin_lens_camera);
}
