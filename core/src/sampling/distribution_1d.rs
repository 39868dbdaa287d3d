//! 1D Discrete Distribution.

use crate::lm::*;

/// A finite probability table built by repeated `add()` followed by
/// `normalize()`. Sampling inverts the cumulative table with a binary search.
#[derive(Clone, Debug)]
pub struct DiscreteDistribution1D {
    /// Cumulative table; `cdf[0] = 0` and `cdf[n]` is the total weight, or 1
    /// once normalized.
    cdf: Vec<Float>,

    /// `true` once `normalize()` was called.
    normalized: bool,
}

impl Default for DiscreteDistribution1D {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscreteDistribution1D {
    /// Returns an empty distribution.
    pub fn new() -> Self {
        Self {
            cdf: vec![0.0],
            normalized: false,
        }
    }

    /// Returns a normalized distribution for the given weights.
    ///
    /// * `weights` - Non-negative weights.
    pub fn from_weights(weights: &[Float]) -> Self {
        let mut dist = Self::new();
        for w in weights {
            dist.add(*w);
        }
        dist.normalize();
        dist
    }

    /// Clear all entries.
    pub fn clear(&mut self) {
        self.cdf.clear();
        self.cdf.push(0.0);
        self.normalized = false;
    }

    /// Append an entry.
    ///
    /// * `weight` - Non-negative weight.
    pub fn add(&mut self, weight: Float) {
        debug_assert!(weight >= 0.0);
        let last = self.cdf[self.cdf.len() - 1];
        self.cdf.push(last + weight);
    }

    /// Normalize the table so the entries sum to one. Returns the sum prior to
    /// normalization. A table whose weights sum to zero is left untouched.
    pub fn normalize(&mut self) -> Float {
        let sum = self.cdf[self.cdf.len() - 1];
        if sum > 0.0 {
            let inv = 1.0 / sum;
            for v in self.cdf.iter_mut() {
                *v *= inv;
            }
        }
        self.normalized = true;
        sum
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.cdf.len() - 1
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample an index: returns `i` such that `cdf(i) <= u < cdf(i + 1)`.
    ///
    /// * `u` - Uniform random number in [0, 1).
    pub fn sample(&self, u: Float) -> usize {
        debug_assert!(self.normalized && !self.is_empty());
        // First entry strictly greater than u.
        let upper = self.cdf.partition_point(|v| *v <= u);
        clamp(upper as isize - 1, 0, self.len() as isize - 1) as usize
    }

    /// Sample an index and rescale `u` to [0, 1) within the selected entry so
    /// it can be reused.
    ///
    /// * `u` - Uniform random number in [0, 1).
    pub fn sample_reuse(&self, u: Float) -> (usize, Float) {
        let i = self.sample(u);
        let w = self.cdf[i + 1] - self.cdf[i];
        let reused = if w > 0.0 {
            min((u - self.cdf[i]) / w, ONE_MINUS_EPSILON)
        } else {
            0.0
        };
        (i, reused)
    }

    /// Returns the probability of selecting an index.
    ///
    /// * `i` - The index.
    pub fn pdf(&self, i: usize) -> Float {
        debug_assert!(i < self.len());
        self.cdf[i + 1] - self.cdf[i]
    }

    /// Returns the cumulative value before entry `i`.
    ///
    /// * `i` - The index.
    pub fn cdf(&self, i: usize) -> Float {
        self.cdf[i]
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sample_selects_bracketing_entry() {
        let dist = DiscreteDistribution1D::from_weights(&[1.0, 2.0, 0.0, 1.0]);
        assert_eq!(dist.sample(0.0), 0);
        assert_eq!(dist.sample(0.2499), 0);
        assert_eq!(dist.sample(0.25), 1);
        assert_eq!(dist.sample(0.7499), 1);
        // Zero weight entry is never selected.
        assert_eq!(dist.sample(0.75), 3);
        assert_eq!(dist.sample(ONE_MINUS_EPSILON), 3);
    }

    #[test]
    fn sample_reuse_rescales() {
        let dist = DiscreteDistribution1D::from_weights(&[1.0, 1.0]);
        let (i, u) = dist.sample_reuse(0.75);
        assert_eq!(i, 1);
        assert!((u - 0.5).abs() < 1e-12);
    }

    #[test]
    fn normalize_returns_sum() {
        let mut dist = DiscreteDistribution1D::new();
        dist.add(2.0);
        dist.add(6.0);
        assert_eq!(dist.normalize(), 8.0);
        assert_eq!(dist.pdf(1), 0.75);
    }

    proptest! {
        #[test]
        fn pdfs_sum_to_one(weights in prop::collection::vec(0.001..10.0f64, 1..64)) {
            let dist = DiscreteDistribution1D::from_weights(&weights);
            let sum: Float = (0..dist.len()).map(|i| dist.pdf(i)).sum();
            prop_assert!((sum - 1.0).abs() < 1e-9);
        }

        #[test]
        fn sample_respects_cdf(
            weights in prop::collection::vec(0.001..10.0f64, 1..64),
            u in 0.0..1.0f64,
        ) {
            let dist = DiscreteDistribution1D::from_weights(&weights);
            let i = dist.sample(u);
            prop_assert!(dist.cdf(i) <= u);
            prop_assert!(i == dist.len() - 1 || u < dist.cdf(i + 1));
        }
    }
}
