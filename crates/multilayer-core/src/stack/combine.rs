//! Two-layer combiner.
//!
//! Given a front element (1) and a back element (2), the equivalent element
//! of the pair is
//!
//! $$
//! \begin{aligned}
//! T_f &= T_{f,2}\, \mathcal{I}_{12}\, \Lambda T_{f,1} \\
//! R_f &= R_{f,1} + T_{b,1}\, \mathcal{I}_{21}\, \Lambda R_{f,2} \Lambda T_{f,1} \\
//! T_b &= T_{b,1}\, \mathcal{I}_{21}\, \Lambda T_{b,2} \\
//! R_b &= R_{b,2} + T_{f,2}\, \mathcal{I}_{12}\, \Lambda R_{b,1} \Lambda T_{b,2}
//! \end{aligned}
//! $$
//!
//! with $\mathcal{I}_{12} = (I - \Lambda R_{b,1} \Lambda R_{f,2})^{-1}$ and
//! $\mathcal{I}_{21} = (I - \Lambda R_{f,2} \Lambda R_{b,1})^{-1}$.

use crate::operator::{check_dim, Operator};
use crate::types::{OpticalElement, Side};

use super::{interreflectance, StackError};

/// Combine two adjacent elements into their equivalent element.
pub fn combine<Op: Operator>(
    front: &OpticalElement<Op>,
    back: &OpticalElement<Op>,
    lambda: &Op,
) -> Result<OpticalElement<Op>, StackError> {
    let dim = lambda.size();
    check_dim(front.t(Side::Front), dim)?;
    check_dim(back.t(Side::Front), dim)?;

    let (tf1, rf1) = (front.t(Side::Front), front.r(Side::Front));
    let (tb1, rb1) = (front.t(Side::Back), front.r(Side::Back));
    let (tf2, rf2) = (back.t(Side::Front), back.r(Side::Front));
    let (tb2, rb2) = (back.t(Side::Back), back.r(Side::Back));

    let ir_forward = interreflectance(rb1, rf2, lambda)?;
    let ir_backward = interreflectance(rf2, rb1, lambda)?;

    // Flux entering the gap from either side.
    let entering_forward = lambda.matmul(tf1);
    let entering_backward = lambda.matmul(tb2);

    let tf = tf2.matmul(&ir_forward).matmul(&entering_forward);
    let rf = rf1.plus(
        &tb1.matmul(&ir_backward)
            .matmul(lambda)
            .matmul(rf2)
            .matmul(&entering_forward),
    );
    let tb = tb1.matmul(&ir_backward).matmul(&entering_backward);
    let rb = rb2.plus(
        &tf2.matmul(&ir_forward)
            .matmul(lambda)
            .matmul(rb1)
            .matmul(&entering_backward),
    );

    Ok(OpticalElement::new(tf, rf, tb, rb)?)
}
