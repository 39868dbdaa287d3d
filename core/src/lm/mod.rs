//! Common numeric helpers

mod axis;
mod common;

// Re-export
pub use axis::*;
pub use common::*;
