//! Common

use crate::lm::abs;
use num_traits::{Num, Zero};
use std::ops::Neg;

/// Dot product trait.
pub trait Dot<V> {
    type Output: Num + Zero + Neg<Output = Self::Output> + PartialOrd + Copy;

    /// Returns the dot product.
    ///
    /// * `other` - The other vector.
    fn dot(&self, other: &V) -> Self::Output;

    /// Returns the absolute value of dot product.
    ///
    /// * `other` - The other vector.
    fn abs_dot(&self, other: &V) -> Self::Output {
        abs(self.dot(other))
    }
}

/// Union trait allows union between two objects.
pub trait Union<T> {
    /// Return the result of a union with an another object of type `T`.
    ///
    /// * `other` - The other object.
    fn union(&self, other: &T) -> Self;
}
