use crate::lmi::LmiError;
use ndarray::{Array1, Array2, ArrayView1};

/// Capabilities of a linear matrix pencil `A_0 + Σ x_i·A_i`.
///
/// Every representation supplies its own evaluation and gradient; there is
/// no fallback body to inherit.
pub trait MatrixPencil {
    /// Length `d` of the parameter vector.
    fn dimension(&self) -> usize;

    /// Side length `m` of the matrices.
    fn size_of_matrices(&self) -> usize;

    /// Writes `A_0 + Σ x_i·A_i` into `out`.
    fn evaluate_into(&self, x: ArrayView1<'_, f64>, out: &mut Array2<f64>) -> Result<(), LmiError>;

    /// Writes `Σ x_i·A_i` into `out`.
    fn evaluate_without_a0_into(
        &self,
        x: ArrayView1<'_, f64>,
        out: &mut Array2<f64>,
    ) -> Result<(), LmiError>;

    /// Unit vector with coordinates proportional to `eᵗ·A_i·e`, the direction
    /// of steepest change of `det(pencil)` at a boundary point `p` where
    /// `pencil(p)·e = 0`.
    fn normalized_determinant_gradient(
        &self,
        p: ArrayView1<'_, f64>,
        e: ArrayView1<'_, f64>,
    ) -> Result<Array1<f64>, LmiError>;

    fn evaluate(&self, x: ArrayView1<'_, f64>) -> Result<Array2<f64>, LmiError> {
        let m = self.size_of_matrices();
        let mut out = Array2::<f64>::zeros((m, m));
        self.evaluate_into(x, &mut out)?;
        Ok(out)
    }

    fn evaluate_without_a0(&self, x: ArrayView1<'_, f64>) -> Result<Array2<f64>, LmiError> {
        let m = self.size_of_matrices();
        let mut out = Array2::<f64>::zeros((m, m));
        self.evaluate_without_a0_into(x, &mut out)?;
        Ok(out)
    }
}
