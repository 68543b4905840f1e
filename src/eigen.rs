//! Extremal-eigenvalue oracles used for spectrahedron membership.

use crate::linalg::faer_ndarray::FaerEigh;
use crate::lmi::LmiError;
use faer::Side;
use ndarray::ArrayView2;

/// Source of the maximum eigenvalue of a real symmetric matrix.
///
/// Membership tests rely on this being the *maximum*: a symmetric matrix is
/// negative semidefinite iff its largest eigenvalue is `<= 0`.
pub trait ExtremalEigenOracle {
    fn max_eigenvalue(&self, matrix: ArrayView2<'_, f64>) -> Result<f64, LmiError>;
}

impl<F> ExtremalEigenOracle for F
where
    F: Fn(ArrayView2<'_, f64>) -> Result<f64, LmiError>,
{
    fn max_eigenvalue(&self, matrix: ArrayView2<'_, f64>) -> Result<f64, LmiError> {
        self(matrix)
    }
}

/// Dense oracle backed by faer's self-adjoint eigensolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseEigenOracle;

impl ExtremalEigenOracle for DenseEigenOracle {
    fn max_eigenvalue(&self, matrix: ArrayView2<'_, f64>) -> Result<f64, LmiError> {
        let (values, _) = matrix.eigh(Side::Lower)?;
        // Take the max explicitly instead of relying on the solver's ordering.
        Ok(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }
}
