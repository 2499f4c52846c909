//! Photovoltaic layers.
//!
//! [`PhotovoltaicLayer`] wraps any optical layer and adds an external
//! quantum efficiency (EQE) curve. The isolated responsivity for light
//! incident on one face is
//!
//! $$ S(\lambda) = A(\lambda)\,\mathrm{EQE}(\lambda)\,\frac{q\lambda}{hc} $$
//!
//! in A/W, where $A$ is the isolated absorptance of that face. The stack
//! propagates $S$ exactly like absorptance, so the per-layer current in a
//! construction accounts for every inter-reflection.

use std::marker::PhantomData;

use log::debug;

use multilayer_core::operator::{DirectionVector, Operator};
use multilayer_core::spectral::{LayerSource, WAVELENGTH_TOLERANCE};
use multilayer_core::stack::StackError;
use multilayer_core::types::{OpticalElement, Side};

use crate::interpolate::LinearTable;
use crate::provider::MaterialError;

/// Elementary charge (C).
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
/// Planck constant (J·s).
pub const PLANCK: f64 = 6.626_070_15e-34;
/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Responsivity of an ideal converter (EQE = 1) at `wavelength_nm`, in A/W.
pub fn ideal_responsivity(wavelength_nm: f64) -> f64 {
    wavelength_nm * 1e-9 * ELEMENTARY_CHARGE / (PLANCK * SPEED_OF_LIGHT)
}

/// An optical layer that converts part of its absorbed energy into current.
pub struct PhotovoltaicLayer<Op: Operator, L: LayerSource<Op>> {
    inner: L,
    eqe: LinearTable,
    /// Basis weights, needed for the isolated absorptance.
    lambda: Op,
    _op: PhantomData<fn() -> Op>,
}

impl<Op: Operator, L: LayerSource<Op>> PhotovoltaicLayer<Op, L> {
    /// Wrap `inner` with EQE samples `(wavelength_nm, eqe)`.
    ///
    /// # Errors
    /// [`MaterialError::Unphysical`] for EQE values outside `[0, 1]`;
    /// [`MaterialError::DataError`] for an invalid table.
    pub fn new(inner: L, eqe: &[(f64, f64)], lambda: Op) -> Result<Self, MaterialError> {
        if let Some(&(wavelength_nm, value)) = eqe.iter().find(|(_, v)| !(0.0..=1.0).contains(v)) {
            return Err(MaterialError::Unphysical {
                wavelength_nm,
                reason: format!("EQE = {value} is outside [0, 1]"),
            });
        }
        let (xs, ys) = eqe.iter().copied().unzip();
        let eqe = LinearTable::new(xs, ys)?;
        debug!(
            "Photovoltaic layer '{}' with EQE over [{}, {}] nm",
            inner.name(),
            eqe.range().0,
            eqe.range().1
        );
        Ok(Self {
            inner,
            eqe,
            lambda,
            _op: PhantomData,
        })
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    /// Interpolated EQE at `wavelength_nm`.
    pub fn eqe(&self, wavelength_nm: f64) -> Result<f64, MaterialError> {
        self.eqe.evaluate(wavelength_nm)
    }
}

impl<Op: Operator, L: LayerSource<Op>> LayerSource<Op> for PhotovoltaicLayer<Op, L> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn wavelengths(&self) -> Vec<f64> {
        let optical = self.inner.wavelengths();
        let (Some(&first), Some(&last)) = (optical.first(), optical.last()) else {
            return Vec::new();
        };
        let (lo, hi) = self.eqe.range();
        let (min, max) = (lo.max(first), hi.min(last));

        // Optical and EQE samples where both are defined.
        let mut grid: Vec<f64> = optical
            .into_iter()
            .chain(self.eqe.xs().iter().copied())
            .filter(|wl| (min..=max).contains(wl))
            .collect();
        grid.sort_by(f64::total_cmp);
        grid.dedup_by(|a, b| (*a - *b).abs() < WAVELENGTH_TOLERANCE);
        grid
    }

    fn element(&self, wavelength_nm: f64) -> Result<OpticalElement<Op>, StackError> {
        self.inner.element(wavelength_nm)
    }

    fn responsivity(
        &self,
        wavelength_nm: f64,
        side: Side,
    ) -> Result<Option<Op::Vector>, StackError> {
        let eqe = self
            .eqe(wavelength_nm)
            .map_err(|e| e.for_layer(self.inner.name()))?;
        let absorptance = self.element(wavelength_nm)?.absorptance(side, &self.lambda);
        Ok(Some(absorptance.scale(eqe * ideal_responsivity(wavelength_nm))))
    }
}
