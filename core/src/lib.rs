//! Core

extern crate bitflags;
#[macro_use]
extern crate hexf;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

// Re-export.
pub mod accelerator;
pub mod app;
pub mod bsdf;
pub mod camera;
pub mod error;
pub mod experiment;
pub mod film;
pub mod geometry;
pub mod image_io;
pub mod light;
pub mod lm;
pub mod mesh;
pub mod paramset;
pub mod pdf;
pub mod primitive;
pub mod registry;
pub mod renderer;
pub mod rng;
pub mod sampler;
pub mod sampling;
pub mod scene;
pub mod scheduler;
pub mod spectrum;
pub mod stats;

// Dependent crates see this crate as `::core`, shadowing the standard `core`
// crate; macros such as `proptest::prop_assert!` expand to
// `::core::result::Result`, so expose that path here.
#[doc(hidden)]
pub use ::core::result;
