//! Packed triangular storage for the coefficient matrices of a pencil.
//!
//! Column `i` of the packed matrix holds the upper triangle of `A_{i+1}` in
//! row-major order: row `r`, columns `r..m`. A linear combination of the
//! coefficient matrices then reduces to one `(m(m+1)/2) × d` matrix-vector
//! product followed by a mirror pass back to a full symmetric matrix.

use crate::linalg::faer_ndarray::fast_av_into;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1};

/// Number of distinct entries of a symmetric `m × m` matrix.
#[inline]
pub fn packed_len(m: usize) -> usize {
    m * (m + 1) / 2
}

/// Write the upper triangle of `matrix` into `column`, row by row.
pub fn pack_upper(matrix: ArrayView2<'_, f64>, mut column: ArrayViewMut1<'_, f64>) {
    let m = matrix.nrows();
    debug_assert_eq!(column.len(), packed_len(m));
    let mut at = 0;
    for row in 0..m {
        for col in row..m {
            column[at] = matrix[[row, col]];
            at += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackedTriangle {
    size: usize,
    coefficients: Array2<f64>,
}

impl PackedTriangle {
    /// Packs `matrices`, each assumed to be a symmetric `size × size` matrix.
    pub fn from_matrices(size: usize, matrices: &[Array2<f64>]) -> Self {
        let mut coefficients = Array2::<f64>::zeros((packed_len(size), matrices.len()));
        for (at_matrix, matrix) in matrices.iter().enumerate() {
            pack_upper(matrix.view(), coefficients.column_mut(at_matrix));
        }
        Self { size, coefficients }
    }

    /// Side length `m` of the matrices this packing reconstructs.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of packed matrices `d`.
    pub fn column_count(&self) -> usize {
        self.coefficients.ncols()
    }

    pub fn coefficients(&self) -> ArrayView2<'_, f64> {
        self.coefficients.view()
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.coefficients.column(index)
    }

    /// Re-packs column `index` from `matrix`.
    pub fn set_column(&mut self, index: usize, matrix: ArrayView2<'_, f64>) {
        debug_assert_eq!(matrix.dim(), (self.size, self.size));
        pack_upper(matrix, self.coefficients.column_mut(index));
    }

    /// Packed form of `Σ x_i·A_{i+1}`.
    pub fn combine(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        debug_assert_eq!(x.len(), self.column_count());
        let mut packed = Array1::<f64>::zeros(self.coefficients.nrows());
        fast_av_into(self.coefficients.view(), x, &mut packed);
        packed
    }

    /// `Σ x_i·A_{i+1}` as a full symmetric matrix written into `out`.
    pub fn combine_into(&self, x: ArrayView1<'_, f64>, out: &mut Array2<f64>) {
        let packed = self.combine(x);
        self.unpack_into(packed.view(), out);
    }

    /// Rebuilds the full symmetric matrix from packed upper-triangular values.
    ///
    /// `out` is reallocated when it is not a standard-layout `m × m` array.
    pub fn unpack_into(&self, packed: ArrayView1<'_, f64>, out: &mut Array2<f64>) {
        let m = self.size;
        debug_assert_eq!(packed.len(), packed_len(m));
        if out.dim() != (m, m) || !out.is_standard_layout() {
            *out = Array2::<f64>::zeros((m, m));
        }
        let Some(data) = out.as_slice_mut() else {
            // Standard layout is guaranteed above.
            return;
        };

        // Lower triangle, column by column: column c owns rows c..m, which
        // sit `m` apart in row-major storage.
        let mut values = packed.iter();
        for col in 0..m {
            for row in col..m {
                if let Some(&v) = values.next() {
                    data[row * m + col] = v;
                }
            }
        }

        // Upper triangle, row by row, same read order.
        let mut values = packed.iter();
        for row in 0..m {
            let start = row * m;
            for slot in &mut data[start + row..start + m] {
                if let Some(&v) = values.next() {
                    *slot = v;
                }
            }
        }
    }

    pub fn unpack(&self, packed: ArrayView1<'_, f64>) -> Array2<f64> {
        let mut out = Array2::<f64>::zeros((self.size, self.size));
        self.unpack_into(packed, &mut out);
        out
    }
}
