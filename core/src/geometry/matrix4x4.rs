//! 4x4 Matrix

use crate::lm::*;
use std::ops::{Index, Mul};

/// A 4x4 matrix containing `Float` values stored in row-major order.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix4x4 {
    /// Stores a 2-D array of Float
    pub m: [[Float; 4]; 4],
}

impl Matrix4x4 {
    /// Zero matrix.
    pub const ZERO: Self = Self { m: [[0.0; 4]; 4] };

    /// Identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Create a 4x4 matrix from rows.
    ///
    /// * `m` - Row-major elements.
    pub fn new(m: [[Float; 4]; 4]) -> Self {
        Self { m }
    }

    /// Returns the transpose of the matrix.
    pub fn transpose(&self) -> Self {
        let mut t = Self::ZERO;
        for (i, row) in self.m.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                t.m[j][i] = *v;
            }
        }
        t
    }

    /// Returns the inverse of the matrix using numerically stable Gauss-Jordan
    /// elimination or `None` if the matrix is singular.
    pub fn inverse(&self) -> Option<Self> {
        let mut indxc = [0; 4];
        let mut indxr = [0; 4];
        let mut ipiv = [0; 4];
        let mut minv = self.m;

        for i in 0..4 {
            let mut irow = 0;
            let mut icol = 0;
            let mut big: Float = 0.0;

            // Choose pivot
            for j in 0..4 {
                if ipiv[j] != 1 {
                    for k in 0..4 {
                        if ipiv[k] == 0 {
                            let abs_minv = abs(minv[j][k]);
                            if abs_minv >= big {
                                big = abs_minv;
                                irow = j;
                                icol = k;
                            }
                        } else if ipiv[k] > 1 {
                            return None;
                        }
                    }
                }
            }

            ipiv[icol] += 1;

            // Swap rows irow and icol for pivot
            if irow != icol {
                minv.swap(irow, icol);
            }

            indxr[i] = irow;
            indxc[i] = icol;
            if minv[icol][icol] == 0.0 {
                return None;
            }

            // Set m[icol][icol] to one by scaling row icol appropriately
            let pivinv = 1.0 / minv[icol][icol];
            minv[icol][icol] = 1.0;
            for j in 0..4 {
                minv[icol][j] *= pivinv;
            }

            // Subtract this row from others to zero out their columns
            for j in 0..4 {
                if j != icol {
                    let save = minv[j][icol];
                    minv[j][icol] = 0.0;
                    for k in 0..4 {
                        minv[j][k] -= minv[icol][k] * save;
                    }
                }
            }
        }

        // Swap columns to reflect permutation
        for j in (0..4).rev() {
            if indxr[j] != indxc[j] {
                for row in minv.iter_mut() {
                    row.swap(indxr[j], indxc[j]);
                }
            }
        }

        Some(Self { m: minv })
    }
}

impl Default for Matrix4x4 {
    /// Returns the default as identity matrix.
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Matrix4x4> for Matrix4x4 {
    type Output = Matrix4x4;

    /// Post-multiply the given matrix.
    ///
    /// * `other` - The other matrix
    fn mul(self, other: Matrix4x4) -> Self::Output {
        let mut m = Matrix4x4::ZERO;
        for i in 0..4 {
            for j in 0..4 {
                m.m[i][j] = self.m[i][0] * other.m[0][j]
                    + self.m[i][1] * other.m[1][j]
                    + self.m[i][2] * other.m[2][j]
                    + self.m[i][3] * other.m[3][j];
            }
        }
        m
    }
}

impl Index<usize> for Matrix4x4 {
    type Output = [Float; 4];

    /// Index the matrix row. The column can be further indexed from the
    /// returned result.
    ///
    /// * `row` - Row
    fn index(&self, row: usize) -> &Self::Output {
        &self.m[row]
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    #[test]
    fn inverse_of_zero_matrix_is_none() {
        assert!(Matrix4x4::ZERO.inverse().is_none());
    }

    #[test]
    fn inverse_of_identity_is_identity() {
        assert_eq!(Matrix4x4::IDENTITY.inverse(), Some(Matrix4x4::IDENTITY));
    }

    proptest! {
        #[test]
        fn inverse_of_singular_matrix_is_none(a in 0.0..10.0f64, b in 0.0..10.0f64, c in 0.0..10.0f64) {
            let m = Matrix4x4::new([
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [  a,   b,   c, 0.0],
            ]);
            prop_assert!(m.inverse().is_none());
        }

        #[test]
        fn product_with_inverse_is_identity(
            a in 0.001..10.0f64, b in 0.001..10.0f64, c in 0.001..10.0f64, d in -5.0..5.0f64,
        ) {
            let mat = Matrix4x4::new([
                [  a, 0.0, 0.0,   d],
                [0.0,   b, 0.0, 0.0],
                [0.0, 0.0,   c, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]);
            let inv = mat.inverse().unwrap();
            let prod = mat * inv;
            for j in 0..4 {
                for i in 0..4 {
                    prop_assert!(approx_eq!(f64, prod.m[i][j], Matrix4x4::IDENTITY.m[i][j], epsilon = 1e-9));
                }
            }
        }
    }
}
