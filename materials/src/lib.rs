//! Materials

#[macro_use]
extern crate log;

mod dielectric;
mod diffuse;
mod mirror;

// Re-export
pub use dielectric::*;
pub use diffuse::*;
pub use mirror::*;

use core::bsdf::GeneralizedBsdf;
use core::registry::ComponentRegistry;

/// Register the surface scattering models.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn GeneralizedBsdf>("diffuse", create_diffuse_bsdf);
    registry.register::<dyn GeneralizedBsdf>("mirror", create_mirror_bsdf);
    registry.register::<dyn GeneralizedBsdf>("dielectric", create_dielectric_bsdf);
}
