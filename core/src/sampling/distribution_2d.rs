//! 2D Discrete Distribution.

use crate::geometry::*;
use crate::lm::*;
use crate::sampling::DiscreteDistribution1D;

/// Samples cells of a 2D grid proportionally to non-negative weights: a
/// marginal distribution over rows and a conditional distribution per row.
#[derive(Clone, Debug)]
pub struct DiscreteDistribution2D {
    /// Conditional distributions, one per row.
    conditional: Vec<DiscreteDistribution1D>,

    /// Marginal distribution over rows.
    marginal: DiscreteDistribution1D,

    /// Number of columns.
    width: usize,
}

impl DiscreteDistribution2D {
    /// Build a distribution from row-major weights.
    ///
    /// * `weights` - Weights, `width * height` values.
    /// * `width`   - Number of columns.
    /// * `height`  - Number of rows.
    pub fn new(weights: &[Float], width: usize, height: usize) -> Self {
        assert_eq!(weights.len(), width * height);

        let mut marginal = DiscreteDistribution1D::new();
        let conditional = weights
            .chunks(width)
            .map(|row| {
                let mut dist = DiscreteDistribution1D::new();
                for w in row {
                    dist.add(*w);
                }
                marginal.add(dist.normalize());
                dist
            })
            .collect();
        marginal.normalize();

        Self {
            conditional,
            marginal,
            width,
        }
    }

    /// Sample a cell. Returns `(column, row)`.
    ///
    /// * `u` - Uniform random number for the row.
    /// * `v` - Uniform random number for the column.
    pub fn sample(&self, u: Float, v: Float) -> (usize, usize) {
        let row = self.marginal.sample(u);
        let col = self.conditional[row].sample(v);
        (col, row)
    }

    /// Returns the probability of selecting a cell.
    ///
    /// * `col` - Column.
    /// * `row` - Row.
    pub fn pdf(&self, col: usize, row: usize) -> Float {
        debug_assert!(col < self.width);
        self.marginal.pdf(row) * self.conditional[row].pdf(col)
    }

    /// Sample a point in [0, 1)^2 with piecewise constant density over the
    /// cells. Returns the point and its density.
    ///
    /// * `u` - Uniform random number for the row.
    /// * `v` - Uniform random number for the column.
    pub fn sample_continuous(&self, u: Float, v: Float) -> (Vector2f, Float) {
        let (row, v_row) = self.marginal.sample_reuse(u);
        let (col, u_col) = self.conditional[row].sample_reuse(v);
        let height = self.conditional.len();
        let p = Vector2f::new(
            (col as Float + u_col) / self.width as Float,
            (row as Float + v_row) / height as Float,
        );
        (p, self.pdf(col, row) * (self.width * height) as Float)
    }

    /// Returns the density `sample_continuous()` produces at a point.
    ///
    /// * `p` - Point in [0, 1]^2.
    pub fn pdf_continuous(&self, p: &Vector2f) -> Float {
        let height = self.conditional.len();
        let col = clamp((p.x * self.width as Float) as isize, 0, self.width as isize - 1) as usize;
        let row = clamp((p.y * height as Float) as isize, 0, height as isize - 1) as usize;
        self.pdf(col, row) * (self.width * height) as Float
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
