//! Ray intersection acceleration data structures.

#[macro_use]
extern crate log;

mod bvh;
mod naive;
mod qbvh;
mod triaccel;

// Re-export
pub use bvh::*;
pub use naive::*;
pub use qbvh::*;
pub use triaccel::*;

use core::accelerator::Accelerator;
use core::registry::ComponentRegistry;

/// Register the acceleration structures.
///
/// * `registry` - The registry.
pub fn register(registry: &mut ComponentRegistry) {
    registry.register::<dyn Accelerator>("qbvh", create_qbvh);
    registry.register::<dyn Accelerator>("bvh", create_bvh_accel);
    registry.register::<dyn Accelerator>("naive", create_naive_accel);
}
