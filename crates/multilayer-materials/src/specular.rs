//! Specular (non-scattering) layers from tabulated spectra.
//!
//! A specular pane is described at each wavelength by its normal-incidence
//! transmittance $\tau$ and front and back reflectance $\rho_f$, $\rho_b$.
//! As a scalar element those numbers are used directly. In a directional
//! basis the pane becomes a diagonal BSDF whose hemispherical value in every
//! direction equals the tabulated one:
//!
//! $$ T_{jj} = \tau / \Lambda_{jj}, \qquad R_{jj} = \rho / \Lambda_{jj} $$
//!
//! Angular dependence of $\tau$ and $\rho$ is not modelled.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use multilayer_core::basis::DirectionalBasis;
use multilayer_core::spectral::LayerSource;
use multilayer_core::stack::StackError;
use multilayer_core::types::OpticalElement;

use crate::interpolate::LinearTable;
use crate::provider::MaterialError;

/// Allowed overshoot of `T + R` above 1 from rounding in measured data.
const ENERGY_TOLERANCE: f64 = 1e-9;

/// One row of a specular spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecularSample {
    pub wavelength_nm: f64,
    pub t: f64,
    pub rf: f64,
    pub rb: f64,
}

impl SpecularSample {
    fn validate(&self) -> Result<(), MaterialError> {
        let unphysical = |reason: String| MaterialError::Unphysical {
            wavelength_nm: self.wavelength_nm,
            reason,
        };
        for (label, value) in [("T", self.t), ("Rf", self.rf), ("Rb", self.rb)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(unphysical(format!("{label} = {value} is outside [0, 1]")));
            }
        }
        if self.t + self.rf > 1.0 + ENERGY_TOLERANCE {
            return Err(unphysical(format!("T + Rf = {} exceeds 1", self.t + self.rf)));
        }
        if self.t + self.rb > 1.0 + ENERGY_TOLERANCE {
            return Err(unphysical(format!("T + Rb = {} exceeds 1", self.t + self.rb)));
        }
        Ok(())
    }
}

/// A specular layer with linearly interpolated T, Rf and Rb.
#[derive(Debug, Clone)]
pub struct SpecularLayer {
    name: String,
    t: LinearTable,
    rf: LinearTable,
    rb: LinearTable,
}

impl SpecularLayer {
    /// Construct from samples sorted by wavelength.
    pub fn new(name: impl Into<String>, samples: &[SpecularSample]) -> Result<Self, MaterialError> {
        for sample in samples {
            sample.validate()?;
        }
        let xs: Vec<f64> = samples.iter().map(|s| s.wavelength_nm).collect();
        let column = |f: fn(&SpecularSample) -> f64| samples.iter().map(f).collect::<Vec<_>>();
        Ok(Self {
            name: name.into(),
            t: LinearTable::new(xs.clone(), column(|s| s.t))?,
            rf: LinearTable::new(xs.clone(), column(|s| s.rf))?,
            rb: LinearTable::new(xs, column(|s| s.rb))?,
        })
    }

    /// Wavelength-independent layer over `[min, max]`.
    pub fn constant(
        name: impl Into<String>,
        min: f64,
        max: f64,
        t: f64,
        rf: f64,
        rb: f64,
    ) -> Result<Self, MaterialError> {
        let samples = [min, max].map(|wavelength_nm| SpecularSample {
            wavelength_nm,
            t,
            rf,
            rb,
        });
        Self::new(name, &samples)
    }

    pub fn range(&self) -> (f64, f64) {
        self.t.range()
    }

    /// Interpolated properties at `wavelength_nm`.
    pub fn sample(&self, wavelength_nm: f64) -> Result<SpecularSample, MaterialError> {
        Ok(SpecularSample {
            wavelength_nm,
            t: self.t.evaluate(wavelength_nm)?,
            rf: self.rf.evaluate(wavelength_nm)?,
            rb: self.rb.evaluate(wavelength_nm)?,
        })
    }

    /// The same layer as a diagonal BSDF in `basis`.
    pub fn in_basis(self, basis: &DirectionalBasis) -> DirectionalSpecular {
        DirectionalSpecular {
            inverse_lambda: basis.weights().mapv(|l| 1.0 / l),
            layer: self,
        }
    }
}

impl LayerSource<f64> for SpecularLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelengths(&self) -> Vec<f64> {
        self.t.xs().to_vec()
    }

    fn element(&self, wavelength_nm: f64) -> Result<OpticalElement<f64>, StackError> {
        let s = self
            .sample(wavelength_nm)
            .map_err(|e| e.for_layer(&self.name))?;
        Ok(OpticalElement::new(s.t, s.rf, s.t, s.rb)?)
    }
}

/// A [`SpecularLayer`] expressed in a directional basis.
#[derive(Debug, Clone)]
pub struct DirectionalSpecular {
    layer: SpecularLayer,
    inverse_lambda: Array1<f64>,
}

impl DirectionalSpecular {
    fn diagonal(&self, value: f64) -> Array2<f64> {
        Array2::from_diag(&(&self.inverse_lambda * value))
    }
}

impl LayerSource<Array2<f64>> for DirectionalSpecular {
    fn name(&self) -> &str {
        &self.layer.name
    }

    fn wavelengths(&self) -> Vec<f64> {
        self.layer.wavelengths()
    }

    fn element(&self, wavelength_nm: f64) -> Result<OpticalElement<Array2<f64>>, StackError> {
        let s = self
            .layer
            .sample(wavelength_nm)
            .map_err(|e| e.for_layer(&self.layer.name))?;
        let t = self.diagonal(s.t);
        Ok(OpticalElement::new(t.clone(), self.diagonal(s.rf), t, self.diagonal(s.rb))?)
    }
}
