//! # Multilayer Materials
//!
//! Layer sources for the multilayer framework. Every layer type implements
//! [`LayerSource`](multilayer_core::spectral::LayerSource), which resolves a
//! wavelength into a single-band optical element.
//!
//! ## Available layers
//!
//! | Layer | Module | Operator |
//! |-------|--------|----------|
//! | Specular pane (tabulated T, Rf, Rb) | [`specular`] | `f64` or diagonal BSDF |
//! | Measured or modelled BSDF | [`bsdf`] | `Array2<f64>` |
//! | Photovoltaic wrapper (EQE) | [`photovoltaic`] | any |
//!
//! ## Interpolation
//!
//! Tabulated data is interpolated linearly ([`interpolate::LinearTable`])
//! between samples. Requests outside the tabulated range are errors.

pub mod bsdf;
pub mod interpolate;
pub mod photovoltaic;
pub mod provider;
pub mod specular;

pub use bsdf::BsdfLayer;
pub use photovoltaic::PhotovoltaicLayer;
pub use provider::MaterialError;
pub use specular::{DirectionalSpecular, SpecularLayer, SpecularSample};
