//! Integrators

#[macro_use]
extern crate log;

mod bpt;
mod common;
mod light_tracer;
mod path;
mod pm;
mod ppm;
mod pssmlt;

#[cfg(test)]
mod test_scenes;

// Re-export.
pub use bpt::*;
pub use common::*;
pub use light_tracer::*;
pub use path::*;
pub use pm::*;
pub use ppm::*;
pub use pssmlt::*;

use core::registry::ComponentRegistry;
use core::renderer::Renderer;

/// Register the renderers and the components they are configured with.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn Renderer>("pt", create_path_tracer);
    registry.register::<dyn Renderer>("lighttrace", create_light_tracer);
    registry.register::<dyn Renderer>("bpt", create_bpt_renderer);
    registry.register::<dyn Renderer>("pssmlt", create_pssmlt_renderer);
    registry.register::<dyn Renderer>("pm", create_photon_mapping_renderer);
    registry.register::<dyn Renderer>("ppm", create_progressive_photon_mapping_renderer);

    registry.register::<dyn MisWeight>("simple", create_simple_mis_weight);
    registry.register::<dyn MisWeight>("balance", create_balance_mis_weight);
    registry.register::<dyn MisWeight>("power", create_power_mis_weight);
    registry.register::<dyn MisWeight>("powernaive", create_power_naive_mis_weight);

    registry.register::<dyn PhotonMap>("kdtree", create_kd_tree_photon_map);
    registry.register::<dyn PhotonMap>("naive", create_naive_photon_map);

    registry.register::<dyn PhotonDensityKernel>("cone", create_cone_kernel);
    registry.register::<dyn PhotonDensityKernel>("gaussian", create_gaussian_kernel);
    registry.register::<dyn PhotonDensityKernel>("simpson", create_simpson_kernel);
}
