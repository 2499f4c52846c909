//! Equivalent-layer composition of an ordered stack of optical elements.
//!
//! The building blocks, leaves first:
//!
//! - [`interreflectance`]: $(I - \Lambda R_{b,1} \Lambda R_{f,2})^{-1}$, the
//!   closed-form sum of the bounces between two adjacent elements.
//! - [`combine`]: the equivalent element of two adjacent elements.
//! - [`EquivalentStack`]: whole-stack properties and per-layer absorptance
//!   for a single waveband.

mod absorptance;
pub mod combine;
pub mod interreflectance;
pub mod single_band;

pub use combine::combine;
pub use interreflectance::interreflectance;
pub use single_band::{EquivalentStack, StackLayer};

use thiserror::Error;

use crate::operator::OperatorError;

/// Errors raised while building or querying a stack.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StackError {
    #[error("Operator dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Layer index {index} out of range for a stack of {count} layers (indices start at 1)")]
    LayerIndexOutOfRange { index: usize, count: usize },

    #[error("Layers {first}..={last} are neither a prefix nor a suffix of a stack of {count} layers")]
    PartialStackUnavailable {
        first: usize,
        last: usize,
        count: usize,
    },

    #[error("Numerical error: {0}")]
    Numerical(OperatorError),

    #[error("Unphysical layer properties: {0}")]
    Unphysical(String),

    #[error("Layer source '{layer}': {message}")]
    LayerSource { layer: String, message: String },

    #[error("Compute backend error: {0}")]
    Compute(String),

    #[error("Wavelength {wavelength_nm} nm is outside [{min}, {max}] nm")]
    WavelengthOutOfRange {
        wavelength_nm: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid wavelength grid: {0}")]
    InvalidWavelengthGrid(String),

    #[error("Layers share no common wavelengths")]
    NoCommonWavelengths,

    #[error("No wavelengths with source energy in [{min}, {max}] nm")]
    EmptyIntegrationRange { min: f64, max: f64 },

    #[error("Direction {direction} out of range for a basis of {count} directions")]
    DirectionOutOfRange { direction: usize, count: usize },

    #[error("Invalid directional basis: {0}")]
    InvalidBasis(String),
}

impl From<OperatorError> for StackError {
    fn from(err: OperatorError) -> Self {
        match err {
            OperatorError::DimensionMismatch { expected, found } => {
                StackError::DimensionMismatch { expected, found }
            }
            singular @ OperatorError::Singular { .. } => StackError::Numerical(singular),
        }
    }
}
