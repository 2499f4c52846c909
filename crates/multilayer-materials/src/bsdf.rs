//! Layers given as BSDF matrices at a set of wavelengths.
//!
//! Each band holds the four $N \times N$ matrices of a layer in a
//! directional basis. A request at wavelength $\lambda$ uses the band with
//! the largest tabulated wavelength not above $\lambda$; BSDF data is not
//! interpolated between bands.

use std::f64::consts::PI;

use ndarray::Array2;

use multilayer_core::basis::DirectionalBasis;
use multilayer_core::spectral::{LayerSource, WAVELENGTH_TOLERANCE};
use multilayer_core::stack::StackError;
use multilayer_core::types::OpticalElement;

use crate::provider::MaterialError;
use crate::specular::SpecularSample;

/// A layer with explicit per-wavelength BSDF matrices.
#[derive(Debug, Clone)]
pub struct BsdfLayer {
    name: String,
    wavelengths: Vec<f64>,
    bands: Vec<OpticalElement<Array2<f64>>>,
}

impl BsdfLayer {
    /// Construct from `(wavelength, element)` bands.
    ///
    /// # Errors
    /// [`MaterialError::DataError`] if there are no bands, the wavelengths
    /// are not strictly increasing, or the bands differ in size.
    pub fn new(
        name: impl Into<String>,
        bands: Vec<(f64, OpticalElement<Array2<f64>>)>,
    ) -> Result<Self, MaterialError> {
        let Some(size) = bands.first().map(|(_, element)| element.size()) else {
            return Err(MaterialError::DataError("BSDF layer has no bands".into()));
        };
        for (i, (wl, element)) in bands.iter().enumerate() {
            if element.size() != size {
                return Err(MaterialError::DataError(format!(
                    "band at {wl} nm has {} directions, expected {size}",
                    element.size()
                )));
            }
            if i > 0 && *wl <= bands[i - 1].0 {
                return Err(MaterialError::DataError(format!(
                    "band wavelengths must be strictly increasing at {wl} nm"
                )));
            }
        }
        let (wavelengths, bands) = bands.into_iter().unzip();
        Ok(Self {
            name: name.into(),
            wavelengths,
            bands,
        })
    }

    /// A perfectly diffusing layer: whatever enters leaves with a Lambertian
    /// distribution, $T_{ij} = \tau / \pi$.
    pub fn lambertian(
        name: impl Into<String>,
        basis: &DirectionalBasis,
        samples: &[SpecularSample],
    ) -> Result<Self, MaterialError> {
        let n = basis.len();
        let uniform = |value: f64| Array2::from_elem((n, n), value / PI);
        let bands = samples
            .iter()
            .map(|s| {
                let element = OpticalElement::new(
                    uniform(s.t),
                    uniform(s.rf),
                    uniform(s.t),
                    uniform(s.rb),
                )
                .map_err(|e| MaterialError::DataError(e.to_string()))?;
                Ok((s.wavelength_nm, element))
            })
            .collect::<Result<Vec<_>, MaterialError>>()?;
        Self::new(name, bands)
    }

    /// Number of directions of the basis the matrices are expressed in.
    pub fn size(&self) -> usize {
        self.bands[0].size()
    }

    fn band(&self, wavelength_nm: f64) -> Result<&OpticalElement<Array2<f64>>, MaterialError> {
        let index = self
            .wavelengths
            .partition_point(|&wl| wl <= wavelength_nm + WAVELENGTH_TOLERANCE);
        match index {
            0 => Err(MaterialError::OutOfRange {
                wavelength_nm,
                min: self.wavelengths[0],
                max: self.wavelengths[self.wavelengths.len() - 1],
            }),
            i => Ok(&self.bands[i - 1]),
        }
    }
}

impl LayerSource<Array2<f64>> for BsdfLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelengths(&self) -> Vec<f64> {
        self.wavelengths.clone()
    }

    fn element(&self, wavelength_nm: f64) -> Result<OpticalElement<Array2<f64>>, StackError> {
        self.band(wavelength_nm)
            .cloned()
            .map_err(|e| e.for_layer(&self.name))
    }
}
