//! Multi-waveband calculations.
//!
//! Layers enter a [`SpectralStack`] as [`LayerSource`]s, which resolve into a
//! single-wavelength [`OpticalElement`] on demand. The stack evaluates one
//! [`EquivalentStack`](crate::stack::EquivalentStack) per wavelength of a
//! grid common to all layers and integrates the resulting series against a
//! source [`Spectrum`].

pub mod integrate;
pub mod multi_band;

pub use integrate::Spectrum;
pub use multi_band::SpectralStack;

use std::sync::Arc;

use crate::operator::Operator;
use crate::stack::StackError;
use crate::types::{OpticalElement, Side};

/// Wavelengths closer than this (nm) are treated as the same grid point.
pub const WAVELENGTH_TOLERANCE: f64 = 1e-9;

/// A layer that can produce its optical element at any wavelength of its
/// range.
///
/// Implementations must be deterministic: the same wavelength yields the
/// same data for the lifetime of a calculation.
pub trait LayerSource<Op: Operator>: Send + Sync {
    /// Human-readable name of this layer.
    fn name(&self) -> &str;

    /// Native wavelength grid (nm), ascending.
    fn wavelengths(&self) -> Vec<f64>;

    /// Optical element at `wavelength_nm`.
    fn element(&self, wavelength_nm: f64) -> Result<OpticalElement<Op>, StackError>;

    /// Photovoltaic responsivity per incoming direction on `side` (A/W),
    /// `None` for passive layers.
    fn responsivity(
        &self,
        wavelength_nm: f64,
        side: Side,
    ) -> Result<Option<Op::Vector>, StackError> {
        let _ = (wavelength_nm, side);
        Ok(None)
    }
}

/// Union of the native grids of all `sources`, restricted to the range they
/// all cover.
pub fn common_wavelengths<Op: Operator>(
    sources: &[Arc<dyn LayerSource<Op>>],
) -> Result<Vec<f64>, StackError> {
    let grids: Vec<Vec<f64>> = sources.iter().map(|s| s.wavelengths()).collect();

    let mut low = f64::NEG_INFINITY;
    let mut high = f64::INFINITY;
    for grid in &grids {
        match (grid.first(), grid.last()) {
            (Some(&first), Some(&last)) => {
                low = low.max(first);
                high = high.min(last);
            }
            _ => return Err(StackError::NoCommonWavelengths),
        }
    }

    let mut union: Vec<f64> = grids
        .into_iter()
        .flatten()
        .filter(|&wl| wl >= low - WAVELENGTH_TOLERANCE && wl <= high + WAVELENGTH_TOLERANCE)
        .collect();
    union.sort_by(f64::total_cmp);
    union.dedup_by(|a, b| (*a - *b).abs() < WAVELENGTH_TOLERANCE);

    if union.is_empty() {
        return Err(StackError::NoCommonWavelengths);
    }
    Ok(union)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Grid(Vec<f64>);

    impl LayerSource<f64> for Grid {
        fn name(&self) -> &str {
            "grid"
        }

        fn wavelengths(&self) -> Vec<f64> {
            self.0.clone()
        }

        fn element(&self, _wavelength_nm: f64) -> Result<OpticalElement<f64>, StackError> {
            Ok(OpticalElement::symmetric(1.0, 0.0)?)
        }
    }

    fn sources(grids: &[&[f64]]) -> Vec<Arc<dyn LayerSource<f64>>> {
        grids
            .iter()
            .map(|g| Arc::new(Grid(g.to_vec())) as Arc<dyn LayerSource<f64>>)
            .collect()
    }

    #[test]
    fn test_union_within_overlap() {
        let s = sources(&[&[300.0, 400.0, 500.0, 600.0], &[350.0, 400.0, 450.0, 550.0]]);
        assert_eq!(
            common_wavelengths(&s).unwrap(),
            vec![350.0, 400.0, 450.0, 500.0, 550.0]
        );
    }

    #[test]
    fn test_disjoint_grids_fail() {
        let s = sources(&[&[300.0, 400.0], &[500.0, 600.0]]);
        assert_eq!(common_wavelengths(&s), Err(StackError::NoCommonWavelengths));
    }

    #[test]
    fn test_empty_grid_fails() {
        let s = sources(&[&[300.0, 400.0], &[]]);
        assert!(common_wavelengths(&s).is_err());
    }
}
