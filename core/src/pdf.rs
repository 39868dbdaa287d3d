//! Probability densities tagged with their measure.

use crate::geometry::*;
use crate::lm::*;
use std::fmt;

/// Measure a probability density is expressed in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ProbabilityMeasure {
    /// Uninitialized.
    #[default]
    None,

    /// Solid angle.
    SolidAngle,

    /// Projected solid angle.
    ProjectedSolidAngle,

    /// Surface area.
    Area,

    /// Discrete probability (Dirac positions, selection).
    Discrete,
}

/// A probability density value with the measure it is expressed in.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PdfEval {
    /// Density value.
    pub v: Float,

    /// Measure.
    pub measure: ProbabilityMeasure,
}

impl PdfEval {
    /// Creates a new density.
    ///
    /// * `v`       - Density value.
    /// * `measure` - The measure.
    pub const fn new(v: Float, measure: ProbabilityMeasure) -> Self {
        Self { v, measure }
    }

    /// Zero density in the given measure.
    ///
    /// * `measure` - The measure.
    pub const fn zero(measure: ProbabilityMeasure) -> Self {
        Self { v: 0.0, measure }
    }

    /// Returns true if the density is zero.
    pub fn is_zero(&self) -> bool {
        self.v == 0.0
    }

    /// Converts a directional density sampled at `from` towards `to` into the
    /// area measure at `to`. Area and discrete densities are returned as is.
    ///
    /// * `from` - Surface the direction was sampled at.
    /// * `to`   - Surface the direction arrives at.
    pub fn convert_to_area(&self, from: &SurfaceGeometry, to: &SurfaceGeometry) -> PdfEval {
        match self.measure {
            ProbabilityMeasure::ProjectedSolidAngle => {
                PdfEval::new(self.v * generalized_geometry_term(from, to), ProbabilityMeasure::Area)
            }
            ProbabilityMeasure::SolidAngle => {
                let v = to.p - from.p;
                let dist2 = v.length_squared();
                if dist2 < EPS_LARGE * EPS_LARGE {
                    return PdfEval::zero(ProbabilityMeasure::Area);
                }
                let d = v / dist2.sqrt();
                PdfEval::new(self.v * to.abs_cos_geometric(&d) / dist2, ProbabilityMeasure::Area)
            }
            _ => *self,
        }
    }
}

impl fmt::Display for PdfEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.v, self.measure)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
