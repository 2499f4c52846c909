//! [`Operator`] implementation for dense square BSDF matrices.
//!
//! Convention: column `j` holds the outgoing distribution produced by unit
//! incident flux in direction `j`, so `M · x` maps an incident flux vector to
//! outgoing radiance and `Λ · M · x` back to flux.

use ndarray::{Array1, Array2, Axis};

use super::{invert_matrix, Operator, OperatorError};

impl Operator for Array2<f64> {
    type Vector = Array1<f64>;

    fn size(&self) -> usize {
        debug_assert_eq!(self.nrows(), self.ncols(), "BSDF matrices are square");
        self.nrows()
    }

    fn identity(dim: usize) -> Self {
        Array2::eye(dim)
    }

    fn zeros(dim: usize) -> Self {
        Array2::zeros((dim, dim))
    }

    fn matmul(&self, rhs: &Self) -> Self {
        self.dot(rhs)
    }

    fn plus(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn minus(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn try_inverse(&self) -> Result<Self, OperatorError> {
        invert_matrix(self)
    }

    fn transpose_apply(&self, v: &Array1<f64>) -> Array1<f64> {
        self.t().dot(v)
    }

    fn hemispherical(&self, lambda: &Self) -> Array1<f64> {
        lambda.dot(self).sum_axis(Axis(0))
    }
}
