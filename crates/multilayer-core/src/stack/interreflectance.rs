//! Interreflectance between two adjacent optical elements.
//!
//! Light leaving element 1 towards element 2 bounces between element 1's
//! back face and element 2's front face. Summing the geometric series of
//! bounces gives
//!
//! $$ \mathcal{I} = (I - \Lambda R_{b,1} \Lambda R_{f,2})^{-1} $$
//!
//! which reduces to $1 / (1 - R_{b,1} R_{f,2})$ for scalars.

use crate::operator::{check_dim, Operator};

use super::StackError;

/// Compute the interreflectance operator.
///
/// # Arguments
/// * `rb1` - Reflectance of the first element, facing the second.
/// * `rf2` - Reflectance of the second element, facing the first.
/// * `lambda` - Directional weighting operator $\Lambda$.
///
/// # Errors
/// [`StackError::DimensionMismatch`] if the operators disagree in size,
/// [`StackError::Numerical`] if $I - \Lambda R_{b,1} \Lambda R_{f,2}$ cannot be
/// inverted.
pub fn interreflectance<Op: Operator>(rb1: &Op, rf2: &Op, lambda: &Op) -> Result<Op, StackError> {
    let dim = lambda.size();
    check_dim(rb1, dim)?;
    check_dim(rf2, dim)?;

    let bounce = lambda.matmul(rb1).matmul(lambda).matmul(rf2);
    let inverse = Op::identity(dim).minus(&bounce).try_inverse()?;
    Ok(inverse)
}
