//! Source spectra and trapezoidal integration over wavelength.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::stack::StackError;

/// A tabulated spectrum, e.g. solar irradiance in W/(m²·nm).
///
/// Values between samples are interpolated linearly; outside the tabulated
/// range the spectrum is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    wavelengths: Vec<f64>,
    values: Vec<f64>,
}

impl Spectrum {
    /// # Errors
    /// [`StackError::Unphysical`] when the lengths differ, fewer than two
    /// samples are given, or wavelengths are not strictly increasing.
    pub fn new(wavelengths: Vec<f64>, values: Vec<f64>) -> Result<Self, StackError> {
        if wavelengths.len() != values.len() {
            return Err(StackError::Unphysical(format!(
                "spectrum has {} wavelengths but {} values",
                wavelengths.len(),
                values.len()
            )));
        }
        if wavelengths.len() < 2 {
            return Err(StackError::Unphysical(
                "spectrum needs at least 2 samples".into(),
            ));
        }
        if let Some(i) = (1..wavelengths.len()).find(|&i| wavelengths[i] <= wavelengths[i - 1]) {
            return Err(StackError::Unphysical(format!(
                "spectrum wavelengths must be strictly increasing at index {i}"
            )));
        }
        Ok(Self { wavelengths, values })
    }

    /// Constant spectrum over `[min, max]`.
    pub fn flat(min: f64, max: f64, value: f64) -> Result<Self, StackError> {
        Self::new(vec![min, max], vec![value, value])
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn at(&self, wavelength_nm: f64) -> f64 {
        let xs = &self.wavelengths;
        if wavelength_nm < xs[0] || wavelength_nm > xs[xs.len() - 1] {
            return 0.0;
        }
        interpolate_linear(xs, &self.values, wavelength_nm)
    }

    /// Sample the spectrum on a grid.
    pub fn resample(&self, grid: &[f64]) -> Vec<f64> {
        grid.iter().map(|&wl| self.at(wl)).collect()
    }
}

/// Piecewise-linear interpolation of `(xs, ys)` at `x`.
///
/// `xs` must be non-empty and strictly increasing. Outside `[xs[0], xs[n-1]]`
/// the nearest end value is returned; callers range-check first.
pub fn interpolate_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    let hi = xs.partition_point(|&xi| xi <= x);
    if hi == 0 {
        return ys[0];
    }
    if hi == n {
        return ys[n - 1];
    }
    let lo = hi - 1;
    let t = (x - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// $\int y\,d\lambda$ by the trapezoidal rule.
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (y[0] + y[1]) * (x[1] - x[0]))
        .sum()
}

/// Indices of `grid` inside `range`.
fn in_range(grid: &[f64], range: &RangeInclusive<f64>) -> Vec<usize> {
    (0..grid.len()).filter(|&i| range.contains(&grid[i])).collect()
}

/// Source-weighted average $\int v E\,d\lambda / \int E\,d\lambda$ over
/// `range`.
///
/// A single grid point inside the range yields the value at that point.
pub fn weighted_average(
    grid: &[f64],
    values: &[f64],
    irradiance: &[f64],
    range: &RangeInclusive<f64>,
) -> Result<f64, StackError> {
    let empty = || StackError::EmptyIntegrationRange {
        min: *range.start(),
        max: *range.end(),
    };
    let idx = in_range(grid, range);
    match idx.as_slice() {
        [] => Err(empty()),
        [i] if irradiance[*i] != 0.0 => Ok(values[*i]),
        [_] => Err(empty()),
        _ => {
            let xs: Vec<f64> = idx.iter().map(|&i| grid[i]).collect();
            let weighted: Vec<f64> = idx.iter().map(|&i| values[i] * irradiance[i]).collect();
            let source: Vec<f64> = idx.iter().map(|&i| irradiance[i]).collect();
            let denominator = trapezoid(&xs, &source);
            if denominator == 0.0 {
                return Err(empty());
            }
            Ok(trapezoid(&xs, &weighted) / denominator)
        }
    }
}

/// Unnormalised $\int v E\,d\lambda$ over `range`.
pub fn weighted_integral(
    grid: &[f64],
    values: &[f64],
    irradiance: &[f64],
    range: &RangeInclusive<f64>,
) -> Result<f64, StackError> {
    let idx = in_range(grid, range);
    if idx.is_empty() {
        return Err(StackError::EmptyIntegrationRange {
            min: *range.start(),
            max: *range.end(),
        });
    }
    let xs: Vec<f64> = idx.iter().map(|&i| grid[i]).collect();
    let weighted: Vec<f64> = idx.iter().map(|&i| values[i] * irradiance[i]).collect();
    Ok(trapezoid(&xs, &weighted))
}
