//! Directional basis for BSDF matrices.
//!
//! The hemisphere is split into rings of polar angle $[\theta_\text{lo},
//! \theta_\text{hi}]$, each divided into $n_\phi$ equal azimuthal patches.
//! The weight of a patch is its projected solid angle
//!
//! $$ \Lambda_j = \frac{\pi (\sin^2\theta_\text{hi} - \sin^2\theta_\text{lo})}{n_\phi} $$
//!
//! so that $\sum_j \Lambda_j = \pi$ over the full hemisphere.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::stack::StackError;

/// One ring of the basis. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasisRing {
    pub theta_low: f64,
    pub theta_high: f64,
    pub n_phi: usize,
}

/// A single patch of the hemisphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    /// Patch centre polar angle (degrees).
    pub theta: f64,
    /// Patch centre azimuth (degrees).
    pub phi: f64,
    /// Projected solid angle.
    pub lambda: f64,
}

/// Index of the normal-incidence direction. Every basis starts with a ring
/// at $\theta = 0$, so this is its first direction.
pub const NORMAL_DIRECTION: usize = 0;

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalBasis {
    rings: Vec<BasisRing>,
    directions: Vec<Direction>,
}

impl DirectionalBasis {
    /// Build a basis from contiguous rings starting at normal incidence.
    pub fn new(rings: Vec<BasisRing>) -> Result<Self, StackError> {
        let mut expected_low = 0.0;
        for ring in &rings {
            if ring.n_phi == 0
                || (ring.theta_low - expected_low).abs() > 1e-9
                || ring.theta_high <= ring.theta_low
                || ring.theta_high > 90.0
            {
                return Err(StackError::InvalidBasis(format!(
                    "ring [{}, {}] x {} does not continue the basis at {} degrees",
                    ring.theta_low, ring.theta_high, ring.n_phi, expected_low
                )));
            }
            expected_low = ring.theta_high;
        }
        if rings.is_empty() {
            return Err(StackError::InvalidBasis("basis has no rings".into()));
        }

        let mut directions = Vec::new();
        for ring in &rings {
            let (lo, hi) = (ring.theta_low.to_radians(), ring.theta_high.to_radians());
            let lambda =
                std::f64::consts::PI * (hi.sin().powi(2) - lo.sin().powi(2)) / ring.n_phi as f64;
            let theta = if ring.theta_low == 0.0 {
                0.0
            } else {
                0.5 * (ring.theta_low + ring.theta_high)
            };
            let dphi = 360.0 / ring.n_phi as f64;
            for k in 0..ring.n_phi {
                directions.push(Direction {
                    theta,
                    phi: k as f64 * dphi,
                    lambda,
                });
            }
        }

        Ok(Self { rings, directions })
    }

    /// The 41-direction quarter Klems basis.
    pub fn klems_quarter() -> Self {
        let rings = [(0.0, 9.0, 1), (9.0, 27.0, 8), (27.0, 45.0, 12), (45.0, 63.0, 12), (63.0, 90.0, 8)]
            .into_iter()
            .map(|(theta_low, theta_high, n_phi)| BasisRing {
                theta_low,
                theta_high,
                n_phi,
            })
            .collect();
        match Self::new(rings) {
            Ok(basis) => basis,
            Err(e) => unreachable!("quarter Klems rings are contiguous: {e}"),
        }
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    pub fn rings(&self) -> &[BasisRing] {
        &self.rings
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    pub fn weights(&self) -> Array1<f64> {
        self.directions.iter().map(|d| d.lambda).collect()
    }

    /// The diagonal weighting operator $\Lambda$.
    pub fn lambda(&self) -> Array2<f64> {
        Array2::from_diag(&self.weights())
    }
}
