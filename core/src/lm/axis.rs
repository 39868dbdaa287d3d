//! Axis

use std::ops::Add;

/// Axis enumeration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Axis {
    #[default]
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// All three axes in order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl From<usize> for Axis {
    fn from(i: usize) -> Self {
        match i {
            0 => Axis::X,
            1 => Axis::Y,
            2 => Axis::Z,
            _ => panic!("invalid axis value"),
        }
    }
}

impl From<u8> for Axis {
    fn from(i: u8) -> Self {
        Axis::from(i as usize)
    }
}

impl From<Axis> for u8 {
    fn from(axis: Axis) -> Self {
        axis as u8
    }
}

impl From<Axis> for usize {
    fn from(axis: Axis) -> usize {
        axis as usize
    }
}

impl Add<usize> for Axis {
    type Output = Axis;
    fn add(self, i: usize) -> Self::Output {
        Axis::from((self as usize + i) % 3)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
use proptest::prelude::*;

#[cfg(test)]
pub fn axis_3d_strategy() -> impl Strategy<Value = Axis> {
    prop_oneof![Just(Axis::X), Just(Axis::Y), Just(Axis::Z)]
}
