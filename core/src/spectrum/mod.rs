//! Spectrum

mod rgb_spectrum;

// Re-export
pub use rgb_spectrum::*;

/// Rendering is tristimulus only.
pub type Spectrum = RGBSpectrum;
