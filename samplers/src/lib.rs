//! Samplers

#[macro_use]
extern crate log;

mod random;
mod rewindable;

// Re-export.
pub use random::*;
pub use rewindable::*;

use core::registry::ComponentRegistry;
use core::sampler::{RewindableSampler, Sampler};

/// Register the samplers.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn Sampler>("random", create_random_sampler);
    registry.register::<dyn Sampler>("rewindable", create_rewindable_sampler_as_sampler);
    registry.register::<dyn RewindableSampler>("rewindable", create_rewindable_sampler);
}
