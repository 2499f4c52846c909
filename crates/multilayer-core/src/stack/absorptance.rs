//! Flux bookkeeping for per-layer absorptance.
//!
//! Layer $i$ sits between a *preceding* partial stack (towards the
//! illuminated environment) and a *following* partial stack. For unit
//! incident flux $\mathbf{x}$ we need
//!
//! - $P\mathbf{x}$: total flux arriving at the face of layer $i$ that points
//!   towards the light, after all bounces with the preceding stack;
//! - $Q\mathbf{x}$: total flux arriving at the opposite face, reflected back
//!   by the following stack.
//!
//! Absorbed energy is then $A_\text{facing}^\mathsf{T} P\mathbf{x} +
//! A_\text{away}^\mathsf{T} Q\mathbf{x}$, so the per-direction terms are
//! $P^\mathsf{T} A_\text{facing}$ and $Q^\mathsf{T} A_\text{away}$.
//!
//! Front and back incidence use this one template; only which partial
//! stacks and which faces are plugged in differs.

use crate::operator::{DirectionVector, Operator};

use super::{interreflectance, StackError};

/// Operators seen by light travelling through layer $i$.
pub(crate) struct Incidence<'a, Op> {
    /// Preceding partial stack as `(transmittance towards the layer,
    /// reflectance facing the layer)`; `None` when layer $i$ is the first
    /// layer hit.
    pub preceding: Option<(&'a Op, &'a Op)>,
    /// Reflectance of layer $i$ together with everything after it, facing
    /// the light.
    pub remainder_r: &'a Op,
    /// Transmittance of layer $i$ in the direction of travel.
    pub layer_t: &'a Op,
    /// Reflectance of layer $i$ facing the following stack.
    pub layer_r: &'a Op,
    /// Reflectance of the following partial stack facing layer $i$; `None`
    /// when layer $i$ is the last layer hit.
    pub following_r: Option<&'a Op>,
}

/// The $P$ and $Q$ operators of one incidence. `None` stands for the exact
/// identity ($P$) or the exact zero ($Q$).
pub(crate) struct FluxPaths<Op> {
    facing: Option<Op>,
    away: Option<Op>,
}

impl<'a, Op: Operator> Incidence<'a, Op> {
    pub fn flux_paths(&self, lambda: &Op) -> Result<FluxPaths<Op>, StackError> {
        let facing = match self.preceding {
            Some((t, r)) => {
                let ir = interreflectance(r, self.remainder_r, lambda)?;
                Some(ir.matmul(lambda).matmul(t))
            }
            None => None,
        };

        let away = match self.following_r {
            Some(following_r) => {
                let ir = interreflectance(self.layer_r, following_r, lambda)?;
                let through = ir.matmul(lambda).matmul(self.layer_t);
                let through = match &facing {
                    Some(p) => through.matmul(p),
                    None => through,
                };
                Some(lambda.matmul(following_r).matmul(&through))
            }
            None => None,
        };

        Ok(FluxPaths { facing, away })
    }
}

impl<Op: Operator> FluxPaths<Op> {
    /// Project per-direction layer vectors (absorptance or responsivity)
    /// onto incident directions: `(facing term, away term)`.
    pub fn project(&self, facing: &Op::Vector, away: &Op::Vector) -> (Op::Vector, Op::Vector) {
        let facing_term = match &self.facing {
            Some(p) => p.transpose_apply(facing),
            None => facing.clone(),
        };
        let away_term = match &self.away {
            Some(q) => q.transpose_apply(away),
            None => Op::Vector::zeros(away.len()),
        };
        (facing_term, away_term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_layer_passes_vectors_through() {
        let paths = Incidence {
            preceding: None,
            remainder_r: &0.1,
            layer_t: &0.8,
            layer_r: &0.1,
            following_r: None,
        }
        .flux_paths(&1.0)
        .unwrap();

        let (facing, away) = paths.project(&0.1, &0.2);
        assert_eq!(facing, 0.1);
        assert_eq!(away, 0.0);
    }

    #[test]
    fn test_following_stack_reflects_flux_back() {
        // Layer T=0.8, R=0.1 in front of a reflector with R=0.15.
        let paths = Incidence {
            preceding: None,
            remainder_r: &0.0,
            layer_t: &0.8,
            layer_r: &0.1,
            following_r: Some(&0.15),
        }
        .flux_paths(&1.0)
        .unwrap();

        let (_, away) = paths.project(&0.0, &1.0);
        let expected = 0.15 * 0.8 / (1.0 - 0.1 * 0.15);
        assert!((away - expected).abs() < 1e-15);
    }
}
