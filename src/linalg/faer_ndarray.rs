use faer::diag::DiagRef;
use faer::linalg::matmul::matmul;
use faer::linalg::solvers;
use faer::{Accum, MatMut, MatRef, Par, Side, get_global_parallelism};
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix2};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaerLinalgError {
    #[error("Self-adjoint eigendecomposition failed: {0:?}")]
    SelfAdjointEigen(solvers::EvdError),
    #[error("Matrix contains non-finite entries")]
    NonFiniteInput,
    #[error("Eigendecomposition of a {rows}x{cols} matrix is undefined")]
    NotSquare { rows: usize, cols: usize },
}

#[inline]
fn should_use_faer_matmul(m: usize, n: usize, k: usize) -> bool {
    // Tiny products stay on ndarray; faer GEMV pays off once the packed
    // coefficient matrix gets moderately tall.
    const MIN_DIM: usize = 32;
    const MIN_FLOP_SCALE: usize = 64 * 64;
    (m >= MIN_DIM || n >= MIN_DIM || k >= MIN_DIM)
        && m.saturating_mul(n).saturating_mul(k) >= MIN_FLOP_SCALE
}

#[inline]
fn array1_to_col_mat_mut(array: &mut Array1<f64>) -> MatMut<'_, f64> {
    let len = array.len();
    let stride = array.strides()[0];
    // SAFETY: pointer, length and stride come from a live, uniquely borrowed
    // ndarray vector; the single column never uses its column stride.
    unsafe { MatMut::from_raw_parts_mut(array.as_mut_ptr(), len, 1, stride, 0) }
}

/// Compute `A * v` into `out`, where `A` is `(n, k)`, `v` has length `k` and
/// `out` has length `n`.
///
/// Small products go through ndarray; larger ones through faer's GEMV.
pub fn fast_av_into(a: ArrayView2<'_, f64>, v: ArrayView1<'_, f64>, out: &mut Array1<f64>) {
    let (n, k) = a.dim();
    debug_assert_eq!(v.len(), k, "vector length must match A cols");
    debug_assert_eq!(out.len(), n, "output length must match A rows");

    if !should_use_faer_matmul(n, 1, k) || out.strides()[0] <= 0 {
        out.assign(&a.dot(&v));
        return;
    }

    let a_view = FaerArrayView::new(&a);
    let v_view = FaerArrayView::column(v);
    let par = if n < 128 || k < 128 {
        Par::Seq
    } else {
        get_global_parallelism()
    };
    let mut out_view = array1_to_col_mat_mut(out);
    matmul(
        out_view.as_mut(),
        Accum::Replace,
        a_view.as_ref(),
        v_view.as_ref(),
        1.0,
        par,
    );
}

fn mat_to_array(mat: MatRef<'_, f64>) -> Array2<f64> {
    Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| mat[(i, j)])
}

fn diag_to_array(diag: DiagRef<'_, f64>) -> Array1<f64> {
    let mat = diag.column_vector().as_mat();
    Array1::from_shape_fn(mat.nrows(), |i| mat[(i, 0)])
}

/// Largest absolute difference `|a_ij - a_ji|` over the strict upper triangle,
/// together with the tolerance it is compared against.
///
/// The tolerance scales with the largest entry so that matrices with large
/// magnitudes are not rejected for ordinary roundoff.
pub fn symmetry_defect(matrix: ArrayView2<'_, f64>, rel_tol: f64, abs_tol: f64) -> (f64, f64) {
    let n = matrix.nrows();
    let scale = matrix.iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
    let tol = abs_tol + rel_tol * scale.max(1.0);
    let mut worst = 0.0f64;
    for i in 0..n {
        for j in i + 1..n {
            worst = worst.max((matrix[[i, j]] - matrix[[j, i]]).abs());
        }
    }
    (worst, tol)
}

enum Backing<'a> {
    Borrowed(ArrayView2<'a, f64>),
    Owned(Array2<f64>),
}

/// Read-only faer view over an ndarray matrix.
///
/// Layouts with non-positive strides are copied into a compact owned array,
/// since faer kernels assume forward traversal.
pub struct FaerArrayView<'a> {
    backing: Backing<'a>,
}

impl<'a> FaerArrayView<'a> {
    pub fn new<S: Data<Elem = f64>>(array: &'a ArrayBase<S, Ix2>) -> Self {
        let strides = array.strides();
        let backing = if strides[0] <= 0 || strides[1] <= 0 {
            Backing::Owned(array.as_standard_layout().into_owned())
        } else {
            Backing::Borrowed(array.view())
        };
        Self { backing }
    }

    /// Views a vector as a single-column matrix.
    pub fn column(vector: ArrayView1<'a, f64>) -> Self {
        let len = vector.len();
        let compact = || Array2::from_shape_fn((len, 1), |(i, _)| vector[i]);
        let backing = if vector.strides()[0] <= 0 {
            Backing::Owned(compact())
        } else {
            match vector.into_shape_with_order((len, 1)) {
                Ok(col) => Backing::Borrowed(col),
                Err(_) => Backing::Owned(compact()),
            }
        };
        Self { backing }
    }

    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, f64> {
        let view = match &self.backing {
            Backing::Borrowed(view) => view.view(),
            Backing::Owned(owned) => owned.view(),
        };
        let (rows, cols) = view.dim();
        let strides = view.strides();
        let (row_stride, col_stride) = (strides[0], strides[1]);
        // SAFETY: the pointer, shape and strides describe either a live borrowed
        // ndarray view with positive strides or the owned copy held by `self`,
        // both of which outlive the returned reference.
        unsafe { MatRef::from_raw_parts(view.as_ptr(), rows, cols, row_stride, col_stride) }
    }
}

pub trait FaerEigh {
    /// Eigenvalues (ascending) and eigenvectors (as columns) of a symmetric matrix.
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError>;
}

impl<S: Data<Elem = f64>> FaerEigh for ArrayBase<S, Ix2> {
    fn eigh(&self, side: Side) -> Result<(Array1<f64>, Array2<f64>), FaerLinalgError> {
        let (rows, cols) = self.dim();
        if rows != cols {
            return Err(FaerLinalgError::NotSquare { rows, cols });
        }
        if self.iter().any(|v| !v.is_finite()) {
            return Err(FaerLinalgError::NonFiniteInput);
        }
        let faer_view = FaerArrayView::new(self);
        let eigen = faer_view
            .as_ref()
            .self_adjoint_eigen(side)
            .map_err(FaerLinalgError::SelfAdjointEigen)?;
        let values = diag_to_array(eigen.S());
        let vectors = mat_to_array(eigen.U());
        Ok((values, vectors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn fast_av_matches_ndarray_on_both_paths() {
        for &(n, k) in &[(3usize, 2usize), (300, 40)] {
            let a = Array2::from_shape_fn((n, k), |(i, j)| ((i * 7 + j * 3) % 11) as f64 - 5.0);
            let v = Array1::from_shape_fn(k, |j| 0.25 * j as f64 - 1.0);
            let mut out = Array1::<f64>::zeros(n);
            fast_av_into(a.view(), v.view(), &mut out);
            let expected = a.dot(&v);
            for i in 0..n {
                assert_abs_diff_eq!(out[i], expected[i], epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn eigh_reports_spectrum_of_symmetric_matrix() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let (values, vectors) = a.eigh(Side::Lower).expect("eigh should succeed");
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        assert_abs_diff_eq!(max, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(min, 1.0, epsilon = 1e-12);
        assert_eq!(vectors.dim(), (2, 2));
    }

    #[test]
    fn eigh_rejects_non_finite_and_rectangular_input() {
        let nan = array![[1.0, f64::NAN], [f64::NAN, 2.0]];
        assert!(matches!(
            nan.eigh(Side::Lower),
            Err(FaerLinalgError::NonFiniteInput)
        ));
        let rect = Array2::<f64>::zeros((2, 3));
        assert!(matches!(
            rect.eigh(Side::Lower),
            Err(FaerLinalgError::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn symmetry_defect_accepts_tiny_roundoff_only() {
        let eps = 1e-14;
        let nearly = array![[2.0, 1.0 + eps], [1.0, 3.0]];
        let (worst, tol) = symmetry_defect(nearly.view(), 1e-12, 1e-12);
        assert!(worst <= tol);
        let skewed = array![[1.0, 10.0], [0.0, 1.0]];
        let (worst, tol) = symmetry_defect(skewed.view(), 1e-12, 1e-12);
        assert_abs_diff_eq!(worst, 10.0);
        assert!(worst > tol);
    }

    #[test]
    fn view_handles_reversed_strides() {
        let a = array![[1.0, 2.0], [3.0, 4.0]];
        let reversed = a.slice(ndarray::s![..;-1, ..]);
        let view = FaerArrayView::new(&reversed);
        let mat = view.as_ref();
        assert_eq!(mat[(0, 0)], 3.0);
        assert_eq!(mat[(1, 1)], 2.0);
    }
}
