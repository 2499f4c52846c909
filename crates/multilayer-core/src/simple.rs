//! Non-angular composition path.
//!
//! Layers here are characterised by three scattering modes per side
//! (direct-direct, direct-diffuse, diffuse-diffuse) instead of a BSDF
//! matrix. The same generic [`EquivalentStack`] does the work:
//!
//! - [`Scattering::DirectDirect`] and [`Scattering::DiffuseDiffuse`] use the
//!   scalar operator (`f64`, $\Lambda = 1$);
//! - [`Scattering::DirectHemispherical`] uses a two-channel matrix operator
//!   over `[direct, diffuse]` with $\Lambda = I$, so energy scattered out of
//!   the direct beam keeps propagating as diffuse light.
//!
//! Absorptance for direct incidence always comes from the two-channel stack:
//! a layer that scatters part of the direct beam does not absorb it.
//!
//! The exterior and interior environments are represented by neutral
//! boundary elements at either end of the internal stacks; layer indices in
//! the public API count only the real layers, starting at 1.

use std::sync::Arc;

use ndarray::{array, Array2};
use serde::{Deserialize, Serialize};

use crate::cache::ComputeOnce;
use crate::operator::Operator;
use crate::stack::{EquivalentStack, StackError};
use crate::types::{AbsorptanceTerms, OpticalElement, Property, Scattering, Side};

/// Scattering properties of one face of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimpleSideProperties {
    pub tau_dir_dir: f64,
    pub tau_dir_dif: f64,
    pub rho_dir_dir: f64,
    pub rho_dir_dif: f64,
    pub tau_dif_dif: f64,
    pub rho_dif_dif: f64,
}

impl SimpleSideProperties {
    /// Purely specular face: no scattering, diffuse properties equal to the
    /// direct ones.
    pub fn specular(tau: f64, rho: f64) -> Self {
        Self {
            tau_dir_dir: tau,
            tau_dir_dif: 0.0,
            rho_dir_dir: rho,
            rho_dir_dif: 0.0,
            tau_dif_dif: tau,
            rho_dif_dif: rho,
        }
    }

    fn validate(&self, side: Side) -> Result<(), StackError> {
        let values = [
            self.tau_dir_dir,
            self.tau_dir_dif,
            self.rho_dir_dir,
            self.rho_dir_dif,
            self.tau_dif_dif,
            self.rho_dif_dif,
        ];
        if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(StackError::Unphysical(format!(
                "{side} properties must lie in [0, 1]"
            )));
        }
        let direct = self.tau_dir_dir + self.tau_dir_dif + self.rho_dir_dir + self.rho_dir_dif;
        let diffuse = self.tau_dif_dif + self.rho_dif_dif;
        if direct > 1.0 + 1e-12 || diffuse > 1.0 + 1e-12 {
            return Err(StackError::Unphysical(format!(
                "{side} transmittance plus reflectance exceeds 1 (direct {direct:.6}, diffuse {diffuse:.6})"
            )));
        }
        Ok(())
    }
}

/// A layer described by scattering modes only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimpleLayer {
    front: SimpleSideProperties,
    back: SimpleSideProperties,
}

impl SimpleLayer {
    pub fn new(front: SimpleSideProperties, back: SimpleSideProperties) -> Result<Self, StackError> {
        front.validate(Side::Front)?;
        back.validate(Side::Back)?;
        Ok(Self { front, back })
    }

    /// Specular layer with equal transmittance from both sides.
    pub fn specular(tau: f64, rho_front: f64, rho_back: f64) -> Result<Self, StackError> {
        Self::new(
            SimpleSideProperties::specular(tau, rho_front),
            SimpleSideProperties::specular(tau, rho_back),
        )
    }

    pub fn side(&self, side: Side) -> &SimpleSideProperties {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
        }
    }

    fn scalar(&self, scattering: Scattering) -> Result<OpticalElement<f64>, StackError> {
        let pick = |p: &SimpleSideProperties| match scattering {
            Scattering::DiffuseDiffuse => (p.tau_dif_dif, p.rho_dif_dif),
            _ => (p.tau_dir_dir, p.rho_dir_dir),
        };
        let (tf, rf) = pick(&self.front);
        let (tb, rb) = pick(&self.back);
        Ok(OpticalElement::new(tf, rf, tb, rb)?)
    }

    /// Two-channel element over `[direct, diffuse]`.
    fn channels(&self) -> Result<OpticalElement<Array2<f64>>, StackError> {
        let t = |p: &SimpleSideProperties| {
            array![[p.tau_dir_dir, 0.0], [p.tau_dir_dif, p.tau_dif_dif]]
        };
        let r = |p: &SimpleSideProperties| {
            array![[p.rho_dir_dir, 0.0], [p.rho_dir_dif, p.rho_dif_dif]]
        };
        Ok(OpticalElement::new(
            t(&self.front),
            r(&self.front),
            t(&self.back),
            r(&self.back),
        )?)
    }
}

const DIRECT: usize = 0;

struct SimpleStacks {
    direct: EquivalentStack<f64>,
    diffuse: EquivalentStack<f64>,
    hemispherical: EquivalentStack<Array2<f64>>,
}

/// Stack of [`SimpleLayer`]s between two environments.
pub struct SimpleStack {
    layers: Vec<SimpleLayer>,
    stacks: ComputeOnce<SimpleStacks>,
}

impl SimpleStack {
    pub fn new(first: SimpleLayer) -> Self {
        Self {
            layers: vec![first],
            stacks: ComputeOnce::new(),
        }
    }

    pub fn add_layer(&mut self, layer: SimpleLayer, side: Side) {
        match side {
            Side::Front => self.layers.insert(0, layer),
            Side::Back => self.layers.push(layer),
        }
        self.stacks.invalidate();
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Whole-stack transmittance or reflectance for incidence on `side`.
    ///
    /// For [`Scattering::DirectHemispherical`] this is the total (direct plus
    /// scattered) leaving for direct incidence.
    pub fn property(
        &self,
        property: Property,
        side: Side,
        scattering: Scattering,
    ) -> Result<f64, StackError> {
        let stacks = self.stacks()?;
        match scattering {
            Scattering::DirectDirect => Ok(*stacks.direct.equivalent()?.property(side, property)),
            Scattering::DiffuseDiffuse => Ok(*stacks.diffuse.equivalent()?.property(side, property)),
            Scattering::DirectHemispherical => {
                let stack = &stacks.hemispherical;
                let op = stack.equivalent()?.property(side, property).clone();
                let lambda = stack.lambda();
                Ok(op.hemispherical(lambda)[DIRECT])
            }
        }
    }

    /// Absorptance of layer `index` (1-based) for incidence on `side`.
    ///
    /// [`Scattering::DirectDirect`] and [`Scattering::DirectHemispherical`]
    /// return the same value: everything a layer absorbs from a direct beam,
    /// including what it absorbs after other layers have scattered it.
    pub fn absorptance(
        &self,
        index: usize,
        side: Side,
        scattering: Scattering,
    ) -> Result<f64, StackError> {
        Ok(self.absorptance_terms(index, side, scattering)?.total())
    }

    pub fn absorptance_terms(
        &self,
        index: usize,
        side: Side,
        scattering: Scattering,
    ) -> Result<AbsorptanceTerms<f64>, StackError> {
        let count = self.layers.len();
        if index == 0 || index > count {
            return Err(StackError::LayerIndexOutOfRange { index, count });
        }
        // Skip the exterior boundary element.
        let inner = index + 1;
        let stacks = self.stacks()?;
        match scattering {
            Scattering::DiffuseDiffuse => stacks.diffuse.layer_absorptance_terms(inner, side),
            Scattering::DirectDirect | Scattering::DirectHemispherical => {
                let terms = stacks.hemispherical.layer_absorptance_terms(inner, side)?;
                Ok(AbsorptanceTerms {
                    front_face: terms.front_face[DIRECT],
                    back_face: terms.back_face[DIRECT],
                })
            }
        }
    }

    fn stacks(&self) -> Result<Arc<SimpleStacks>, StackError> {
        self.stacks.get_or_try_compute(|| self.build())
    }

    fn build(&self) -> Result<SimpleStacks, StackError> {
        let direct = bounded(1.0, |l| l.scalar(Scattering::DirectDirect), &self.layers)?;
        let diffuse = bounded(1.0, |l| l.scalar(Scattering::DiffuseDiffuse), &self.layers)?;
        let hemispherical = bounded(Array2::eye(2), SimpleLayer::channels, &self.layers)?;
        Ok(SimpleStacks {
            direct,
            diffuse,
            hemispherical,
        })
    }
}

/// Equivalent stack of `layers` with a neutral boundary element at each end.
fn bounded<Op: Operator>(
    lambda: Op,
    element: impl Fn(&SimpleLayer) -> Result<OpticalElement<Op>, StackError>,
    layers: &[SimpleLayer],
) -> Result<EquivalentStack<Op>, StackError> {
    let environment = OpticalElement::neutral(&lambda)?;
    let mut stack = EquivalentStack::with_layer(lambda, environment.clone())?;
    for layer in layers {
        stack.add_layer(element(layer)?, Side::Back)?;
    }
    stack.add_layer(environment, Side::Back)?;
    Ok(stack)
}
