//! Linear interpolation of tabulated spectral data.
//!
//! Optical data for glazing and coatings is measured at discrete
//! wavelengths, often on irregular grids. Between samples the value is
//! interpolated linearly, which keeps interpolated transmittance and
//! reflectance inside the physical range of the samples.

use multilayer_core::spectral::integrate::interpolate_linear;

use crate::provider::MaterialError;

/// A piecewise-linear interpolator for real-valued data.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTable {
    /// Strictly increasing x values.
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearTable {
    /// Construct from data points.
    ///
    /// # Errors
    /// [`MaterialError::DataError`] if `xs` and `ys` have different lengths,
    /// if `xs` is not strictly increasing, or if no points are provided.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, MaterialError> {
        if xs.len() != ys.len() {
            return Err(MaterialError::DataError(format!(
                "{} wavelengths but {} values",
                xs.len(),
                ys.len()
            )));
        }
        if xs.is_empty() {
            return Err(MaterialError::DataError("table has no samples".into()));
        }
        if let Some(i) = (1..xs.len()).find(|&i| xs[i] <= xs[i - 1]) {
            return Err(MaterialError::DataError(format!(
                "wavelengths must be strictly increasing at index {i}"
            )));
        }
        Ok(Self { xs, ys })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    /// `(first, last)` sample position.
    pub fn range(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Interpolated value at `x`.
    ///
    /// # Errors
    /// [`MaterialError::OutOfRange`] outside `[first, last]`.
    pub fn evaluate(&self, x: f64) -> Result<f64, MaterialError> {
        let (min, max) = self.range();
        if x < min || x > max {
            return Err(MaterialError::OutOfRange {
                wavelength_nm: x,
                min,
                max,
            });
        }
        Ok(interpolate_linear(&self.xs, &self.ys, x))
    }
}
