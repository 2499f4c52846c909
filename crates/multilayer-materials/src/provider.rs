//! Errors shared by the layer sources.

use multilayer_core::stack::StackError;
use thiserror::Error;

/// Errors from layer data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MaterialError {
    #[error("Wavelength {wavelength_nm} nm is outside the data range [{min}, {max}] nm")]
    OutOfRange {
        wavelength_nm: f64,
        min: f64,
        max: f64,
    },

    #[error("Unphysical data at {wavelength_nm} nm: {reason}")]
    Unphysical { wavelength_nm: f64, reason: String },

    #[error("Data error: {0}")]
    DataError(String),
}

impl MaterialError {
    /// Attach the layer name and convert into the stack's error type.
    pub fn for_layer(self, layer: &str) -> StackError {
        match self {
            MaterialError::OutOfRange {
                wavelength_nm,
                min,
                max,
            } => StackError::WavelengthOutOfRange {
                wavelength_nm,
                min,
                max,
            },
            other => StackError::LayerSource {
                layer: layer.to_string(),
                message: other.to_string(),
            },
        }
    }
}
