//! Lights

#[macro_use]
extern crate log;

mod area;
mod directional;
mod environment;

// Re-export.
pub use area::*;
pub use directional::*;
pub use environment::*;

use core::light::Light;
use core::registry::ComponentRegistry;

/// Register the light sources.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn Light>("area", create_area_light);
    registry.register::<dyn Light>("directional", create_directional_light);
    registry.register::<dyn Light>("env.const", create_constant_environment_light);
    registry.register::<dyn Light>("env.bitmap", create_bitmap_environment_light);
}
