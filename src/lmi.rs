//! Dense linear matrix inequality `A_0 + Σ x_i·A_i ⪯ 0`.
//!
//! The feasible set of the inequality is a spectrahedron. [`Lmi`] evaluates the
//! pencil through a [`PackedTriangle`] of the coefficient matrices and answers
//! membership queries through an [`ExtremalEigenOracle`].

use crate::eigen::{DenseEigenOracle, ExtremalEigenOracle};
use crate::linalg::faer_ndarray::{FaerLinalgError, symmetry_defect};
use crate::packed::{PackedTriangle, packed_len};
use crate::pencil::MatrixPencil;
use crate::types::{EvaluationStrategy, LmiOptions};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;
use std::fmt;
use thiserror::Error;

/// Gradient norms below this are still normalized, but logged.
const GRADIENT_NORM_WARN: f64 = 1e-12;

#[derive(Debug, Error)]
pub enum LmiError {
    #[error("A matrix pencil needs at least the constant matrix A0, but no matrices were given.")]
    EmptyMatrixSequence,

    #[error("The matrices of a pencil must have at least one row.")]
    ZeroSizedMatrix,

    #[error("Matrix A{index} is not square: it has {rows} rows and {cols} columns.")]
    NonSquareMatrix {
        index: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Matrix A{index} is {found}x{found}, but A0 is {expected}x{expected}.")]
    InconsistentMatrixSize {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error(
        "Matrix A{index} is not symmetric (max |a_ij - a_ji| = {max_asymmetry:.3e}, tolerance {tolerance:.3e})."
    )]
    NonSymmetricMatrix {
        index: usize,
        max_asymmetry: f64,
        tolerance: f64,
    },

    #[error("Matrix A{index} contains non-finite entries.")]
    NonFiniteEntry { index: usize },

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Matrix index {index} is out of range for a pencil with {count} matrices.")]
    MatrixIndexOutOfRange { index: usize, count: usize },

    #[error(
        "The determinant gradient vanishes: e'A_i e = 0 for every i, so it cannot be normalized."
    )]
    DegenerateGradient,

    #[error("The determinant gradient has a non-finite norm ({norm}).")]
    NonFiniteGradient { norm: f64 },

    #[error(transparent)]
    Eigen(#[from] FaerLinalgError),
}

fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), LmiError> {
    if expected != found {
        return Err(LmiError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

fn validate_matrix(
    index: usize,
    matrix: ArrayView2<'_, f64>,
    size: usize,
    options: &LmiOptions,
) -> Result<(), LmiError> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(LmiError::NonSquareMatrix { index, rows, cols });
    }
    if rows != size {
        return Err(LmiError::InconsistentMatrixSize {
            index,
            expected: size,
            found: rows,
        });
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(LmiError::NonFiniteEntry { index });
    }
    let (max_asymmetry, tolerance) =
        symmetry_defect(matrix, options.symmetry_rel_tol, options.symmetry_abs_tol);
    if max_asymmetry > tolerance {
        return Err(LmiError::NonSymmetricMatrix {
            index,
            max_asymmetry,
            tolerance,
        });
    }
    if max_asymmetry > 0.0 {
        // Evaluation mirrors the upper triangle, so the lower one is dropped.
        log::warn!(
            "[LMI] A{} is asymmetric by {:.3e} (within tolerance {:.3e}); upper triangle is used",
            index,
            max_asymmetry,
            tolerance
        );
    }
    Ok(())
}

/// A linear matrix pencil over dense symmetric matrices.
#[derive(Debug, Clone)]
pub struct Lmi {
    /// `A_0, A_1, ..., A_d`.
    matrices: Vec<Array2<f64>>,
    /// Upper triangles of `A_1..A_d`, one per column.
    packed: PackedTriangle,
    options: LmiOptions,
}

impl Lmi {
    pub fn new(matrices: Vec<Array2<f64>>) -> Result<Self, LmiError> {
        Self::with_options(matrices, LmiOptions::default())
    }

    /// Validates `matrices` (`A_0` first) and builds the packed coefficients.
    pub fn with_options(matrices: Vec<Array2<f64>>, options: LmiOptions) -> Result<Self, LmiError> {
        let Some(a0) = matrices.first() else {
            return Err(LmiError::EmptyMatrixSequence);
        };
        let m = a0.nrows();
        if m == 0 {
            return Err(LmiError::ZeroSizedMatrix);
        }
        for (index, matrix) in matrices.iter().enumerate() {
            validate_matrix(index, matrix.view(), m, &options)?;
        }

        let packed = PackedTriangle::from_matrices(m, &matrices[1..]);
        log::debug!(
            "[LMI] built pencil with d={}, m={}, packed {}x{} ({:?} evaluation)",
            matrices.len() - 1,
            m,
            packed_len(m),
            packed.column_count(),
            options.evaluation
        );
        Ok(Self {
            matrices,
            packed,
            options,
        })
    }

    /// `A_0, ..., A_d`.
    pub fn matrices(&self) -> &[Array2<f64>] {
        &self.matrices
    }

    /// `A_index`, or `None` past `A_d`.
    pub fn matrix(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        self.matrices.get(index).map(|a| a.view())
    }

    pub fn packed(&self) -> &PackedTriangle {
        &self.packed
    }

    pub fn options(&self) -> &LmiOptions {
        &self.options
    }

    /// Replaces `A_index` and refreshes its packed column.
    ///
    /// The replacement goes through the same checks as construction; on error
    /// the pencil is left untouched.
    pub fn replace_matrix(&mut self, index: usize, matrix: Array2<f64>) -> Result<(), LmiError> {
        let count = self.matrices.len();
        if index >= count {
            return Err(LmiError::MatrixIndexOutOfRange { index, count });
        }
        validate_matrix(index, matrix.view(), self.size_of_matrices(), &self.options)?;
        if index > 0 {
            self.packed.set_column(index - 1, matrix.view());
        }
        self.matrices[index] = matrix;
        Ok(())
    }

    /// `Σ x_i·A_i` as a plain weighted sum of the full matrices.
    pub fn evaluate_without_a0_naive(
        &self,
        x: ArrayView1<'_, f64>,
    ) -> Result<Array2<f64>, LmiError> {
        check_len("x", self.dimension(), x.len())?;
        let m = self.size_of_matrices();
        let mut out = Array2::<f64>::zeros((m, m));
        for (&xi, a) in x.iter().zip(&self.matrices[1..]) {
            out.scaled_add(xi, a);
        }
        Ok(out)
    }

    /// Whether `matrix` is negative semidefinite, according to the dense oracle.
    pub fn is_negative_semidefinite_matrix(
        &self,
        matrix: ArrayView2<'_, f64>,
    ) -> Result<bool, LmiError> {
        self.is_negative_semidefinite_matrix_with(&DenseEigenOracle, matrix)
    }

    pub fn is_negative_semidefinite_matrix_with<O: ExtremalEigenOracle + ?Sized>(
        &self,
        oracle: &O,
        matrix: ArrayView2<'_, f64>,
    ) -> Result<bool, LmiError> {
        let m = self.size_of_matrices();
        check_len("matrix rows", m, matrix.nrows())?;
        check_len("matrix cols", m, matrix.ncols())?;
        let max_eigenvalue = oracle.max_eigenvalue(matrix)?;
        Ok(max_eigenvalue <= 0.0)
    }

    /// Whether `position` lies in the spectrahedron `{x : A_0 + Σ x_i·A_i ⪯ 0}`.
    pub fn is_negative_semidefinite(
        &self,
        position: ArrayView1<'_, f64>,
    ) -> Result<bool, LmiError> {
        self.is_negative_semidefinite_with(&DenseEigenOracle, position)
    }

    pub fn is_negative_semidefinite_with<O: ExtremalEigenOracle + ?Sized>(
        &self,
        oracle: &O,
        position: ArrayView1<'_, f64>,
    ) -> Result<bool, LmiError> {
        let matrix = self.evaluate(position)?;
        self.is_negative_semidefinite_matrix_with(oracle, matrix.view())
    }

    /// Membership of many points at once, evaluated in parallel.
    pub fn feasibility_batch(&self, points: &[Array1<f64>]) -> Vec<Result<bool, LmiError>> {
        points
            .par_iter()
            .map(|point| self.is_negative_semidefinite(point.view()))
            .collect()
    }
}

impl MatrixPencil for Lmi {
    fn dimension(&self) -> usize {
        self.matrices.len() - 1
    }

    fn size_of_matrices(&self) -> usize {
        self.packed.size()
    }

    fn evaluate_into(&self, x: ArrayView1<'_, f64>, out: &mut Array2<f64>) -> Result<(), LmiError> {
        self.evaluate_without_a0_into(x, out)?;
        *out += &self.matrices[0];
        Ok(())
    }

    fn evaluate_without_a0_into(
        &self,
        x: ArrayView1<'_, f64>,
        out: &mut Array2<f64>,
    ) -> Result<(), LmiError> {
        check_len("x", self.dimension(), x.len())?;
        match self.options.evaluation {
            EvaluationStrategy::Packed => self.packed.combine_into(x, out),
            EvaluationStrategy::Naive => *out = self.evaluate_without_a0_naive(x)?,
        }
        Ok(())
    }

    fn normalized_determinant_gradient(
        &self,
        p: ArrayView1<'_, f64>,
        e: ArrayView1<'_, f64>,
    ) -> Result<Array1<f64>, LmiError> {
        check_len("p", self.dimension(), p.len())?;
        check_len("e", self.size_of_matrices(), e.len())?;

        // i-th coordinate of the determinant gradient is e' A_i e.
        let mut gradient = Array1::<f64>::zeros(self.dimension());
        for (g, a) in gradient.iter_mut().zip(&self.matrices[1..]) {
            *g = e.dot(&a.dot(&e));
        }

        if gradient.iter().any(|g| !g.is_finite()) {
            let norm = gradient.dot(&gradient).sqrt();
            return Err(LmiError::NonFiniteGradient { norm });
        }
        if gradient.iter().all(|g| *g == 0.0) {
            return Err(LmiError::DegenerateGradient);
        }

        // Scale by the largest entry first so the norm neither underflows nor
        // overflows for very small or very large e.
        let max_abs = gradient.iter().fold(0.0f64, |acc, g| acc.max(g.abs()));
        gradient /= max_abs;
        let scaled_norm = gradient.dot(&gradient).sqrt();
        let norm = max_abs * scaled_norm;
        if norm < GRADIENT_NORM_WARN {
            log::warn!(
                "[LMI] determinant gradient norm {:.3e} is tiny; e may not be a kernel vector",
                norm
            );
        }
        gradient /= scaled_norm;
        Ok(gradient)
    }
}

impl fmt::Display for Lmi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, matrix) in self.matrices.iter().enumerate() {
            writeln!(f, "A{i}")?;
            writeln!(f, "{matrix}")?;
            writeln!(f)?;
        }
        Ok(())
    }
}
