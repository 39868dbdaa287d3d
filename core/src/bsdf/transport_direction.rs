//! Transport Direction

use std::ops::{Index, IndexMut};

/// Direction in which a subpath is traced. `LE` traces from a light towards
/// the eye (adjoint, importance is transported); `EL` traces from the eye.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransportDirection {
    /// Light to eye.
    LE = 0,

    /// Eye to light.
    EL = 1,
}

impl TransportDirection {
    /// Returns the opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Self::LE => Self::EL,
            Self::EL => Self::LE,
        }
    }
}

/// A pair of values indexed by transport direction.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PerDirection<T>(pub [T; 2]);

impl<T> Index<TransportDirection> for PerDirection<T> {
    type Output = T;

    fn index(&self, d: TransportDirection) -> &T {
        &self.0[d as usize]
    }
}

impl<T> IndexMut<TransportDirection> for PerDirection<T> {
    fn index_mut(&mut self, d: TransportDirection) -> &mut T {
        &mut self.0[d as usize]
    }
}
