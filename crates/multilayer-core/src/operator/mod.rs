//! Linear-operator primitives shared by the scalar and matrix composition
//! paths.
//!
//! Every quantity in the equivalent-layer algebra (transmittance,
//! reflectance, the weighting operator Λ, the interreflectance operator) is
//! an [`Operator`]. Two implementations exist:
//!
//! - `f64`: the non-angular case, $N = 1$ and $\Lambda = 1$.
//! - `ndarray::Array2<f64>`: direction-resolved BSDF matrices, $N \times N$.
//!
//! Per-direction quantities (absorptance, photovoltaic responsivity) live in
//! the associated [`Operator::Vector`] type.

mod inverse;
mod matrix;

pub use inverse::{invert_matrix, MAX_CONDITION_NUMBER};

use std::fmt::Debug;

use ndarray::Array1;
use thiserror::Error;

/// Smallest magnitude a scalar may have and still be inverted.
pub const SINGULARITY_TOLERANCE: f64 = 1e-12;

/// Failures of the operator algebra itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperatorError {
    #[error("Operator is singular or ill-conditioned (condition estimate {condition:.3e})")]
    Singular { condition: f64 },

    #[error("Operator dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Minimal algebra the composition engine needs from a linear operator.
pub trait Operator: Clone + Debug + Send + Sync + 'static {
    /// Per-direction vector acted on by this operator.
    type Vector: DirectionVector;

    /// Number of directions $N$.
    fn size(&self) -> usize;

    fn identity(dim: usize) -> Self;

    fn zeros(dim: usize) -> Self;

    /// Operator product `self · rhs`.
    fn matmul(&self, rhs: &Self) -> Self;

    fn plus(&self, rhs: &Self) -> Self;

    fn minus(&self, rhs: &Self) -> Self;

    /// Inverse, or [`OperatorError::Singular`] when the operator cannot be
    /// inverted reliably.
    fn try_inverse(&self) -> Result<Self, OperatorError>;

    /// Row-vector product $\mathbf{v}^\mathsf{T} \cdot \mathbf{M}$.
    fn transpose_apply(&self, v: &Self::Vector) -> Self::Vector;

    /// Outgoing energy per incoming direction, $\mathbf{1}^\mathsf{T} \Lambda \mathbf{M}$.
    fn hemispherical(&self, lambda: &Self) -> Self::Vector;
}

/// Vector of per-incoming-direction values.
pub trait DirectionVector: Clone + Debug + PartialEq + Send + Sync + 'static {
    fn zeros(dim: usize) -> Self;

    fn ones(dim: usize) -> Self;

    fn len(&self) -> usize;

    fn plus(&self, rhs: &Self) -> Self;

    fn minus(&self, rhs: &Self) -> Self;

    /// Element-wise product.
    fn hadamard(&self, rhs: &Self) -> Self;

    fn scale(&self, factor: f64) -> Self;

    /// Value for incoming direction `j`, `None` when out of range.
    fn component(&self, j: usize) -> Option<f64>;
}

impl Operator for f64 {
    type Vector = f64;

    fn size(&self) -> usize {
        1
    }

    fn identity(_dim: usize) -> Self {
        1.0
    }

    fn zeros(_dim: usize) -> Self {
        0.0
    }

    fn matmul(&self, rhs: &Self) -> Self {
        self * rhs
    }

    fn plus(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn minus(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn try_inverse(&self) -> Result<Self, OperatorError> {
        if !self.is_finite() || self.abs() < SINGULARITY_TOLERANCE {
            return Err(OperatorError::Singular {
                condition: f64::INFINITY,
            });
        }
        Ok(1.0 / self)
    }

    fn transpose_apply(&self, v: &f64) -> f64 {
        v * self
    }

    fn hemispherical(&self, lambda: &Self) -> f64 {
        lambda * self
    }
}

impl DirectionVector for f64 {
    fn zeros(_dim: usize) -> Self {
        0.0
    }

    fn ones(_dim: usize) -> Self {
        1.0
    }

    fn len(&self) -> usize {
        1
    }

    fn plus(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn minus(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn hadamard(&self, rhs: &Self) -> Self {
        self * rhs
    }

    fn scale(&self, factor: f64) -> Self {
        self * factor
    }

    fn component(&self, j: usize) -> Option<f64> {
        (j == 0).then_some(*self)
    }
}

impl DirectionVector for Array1<f64> {
    fn zeros(dim: usize) -> Self {
        Array1::zeros(dim)
    }

    fn ones(dim: usize) -> Self {
        Array1::ones(dim)
    }

    fn len(&self) -> usize {
        Array1::len(self)
    }

    fn plus(&self, rhs: &Self) -> Self {
        self + rhs
    }

    fn minus(&self, rhs: &Self) -> Self {
        self - rhs
    }

    fn hadamard(&self, rhs: &Self) -> Self {
        self * rhs
    }

    fn scale(&self, factor: f64) -> Self {
        self * factor
    }

    fn component(&self, j: usize) -> Option<f64> {
        self.get(j).copied()
    }
}

/// Fail with [`OperatorError::DimensionMismatch`] unless `op` has dimension `expected`.
pub fn check_dim<Op: Operator>(op: &Op, expected: usize) -> Result<(), OperatorError> {
    let found = op.size();
    if found != expected {
        return Err(OperatorError::DimensionMismatch { expected, found });
    }
    Ok(())
}
