//! # Multilayer Core
//!
//! The numerical backbone of the multilayer framework. This crate computes
//! the combined optical behaviour of a stack of planar layers (glazing,
//! coatings, shades) from each layer's transmittance and reflectance, and
//! recovers how much of the incident energy every individual layer absorbs.
//!
//! ## Architecture
//!
//! All composition code is generic over the [`operator::Operator`] trait, so
//! one implementation serves both scalar (non-angular) layers and
//! direction-resolved BSDF matrices. [`stack::EquivalentStack`] solves one
//! waveband; [`spectral::SpectralStack`] drives it once per wavelength
//! through a `multilayer-compute` backend.
//!
//! ## Modules
//!
//! - [`operator`] — Scalar and matrix operator algebra.
//! - [`types`] — Sides, properties, optical elements.
//! - [`stack`] — Interreflectance, two-layer combiner, single-band stack.
//! - [`spectral`] — Layer sources, multi-band orchestrator, integration.
//! - [`simple`] — Direct/diffuse composition without a BSDF basis.
//! - [`basis`] — Directional basis and its weighting operator Λ.
//! - [`cache`] — Compute-once cache gate.

pub mod basis;
pub mod cache;
pub mod operator;
pub mod simple;
pub mod spectral;
pub mod stack;
pub mod types;
