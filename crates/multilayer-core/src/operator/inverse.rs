//! Dense matrix inversion for interreflectance operators.
//!
//! Uses LU decomposition with partial pivoting via `faer`, solving against
//! the identity. The result is rejected when it is not finite or when the
//! 1-norm condition estimate $\kappa_1 = \|A\|_1 \|A^{-1}\|_1$ exceeds
//! [`MAX_CONDITION_NUMBER`].

use faer::linalg::solvers::SpSolver;
use ndarray::{Array2, Axis};

use super::OperatorError;

/// Largest accepted 1-norm condition estimate.
pub const MAX_CONDITION_NUMBER: f64 = 1e12;

/// Invert a square matrix.
///
/// # Arguments
/// * `matrix` - The $N \times N$ operator to invert.
///
/// # Returns
/// $A^{-1}$, or [`OperatorError::Singular`] if $A$ is (numerically) singular.
pub fn invert_matrix(matrix: &Array2<f64>) -> Result<Array2<f64>, OperatorError> {
    let dim = matrix.nrows();
    if dim != matrix.ncols() {
        return Err(OperatorError::DimensionMismatch {
            expected: dim,
            found: matrix.ncols(),
        });
    }
    if dim == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    let faer_mat = faer::Mat::<f64>::from_fn(dim, dim, |i, j| matrix[[i, j]]);
    let identity = faer::Mat::<f64>::identity(dim, dim);

    let lu = faer_mat.partial_piv_lu();
    let faer_inv = lu.solve(&identity);

    let inverse = Array2::from_shape_fn((dim, dim), |(i, j)| faer_inv[(i, j)]);

    let condition = norm_1(matrix) * norm_1(&inverse);
    if !condition.is_finite() || condition > MAX_CONDITION_NUMBER {
        return Err(OperatorError::Singular { condition });
    }

    Ok(inverse)
}

/// Maximum absolute column sum.
fn norm_1(matrix: &Array2<f64>) -> f64 {
    matrix
        .mapv(f64::abs)
        .sum_axis(Axis(0))
        .iter()
        .fold(0.0_f64, |acc, &v| if v.is_nan() { f64::NAN } else { acc.max(v) })
}
