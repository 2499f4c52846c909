//! Core types shared across the multilayer framework.
//!
//! This module defines the value types the composition engine passes
//! around: sides, properties, optical elements, and absorptance terms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::operator::{check_dim, DirectionVector, Operator, OperatorError};

/// Face of a layer or stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Front, Side::Back];

    pub fn opposite(self) -> Side {
        match self {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
        }
    }

    /// Position in `[front, back]` arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            Side::Front => 0,
            Side::Back => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Front => write!(f, "front"),
            Side::Back => write!(f, "back"),
        }
    }
}

/// Transmittance or reflectance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    T,
    R,
}

/// Scattering mode of the non-angular composition path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scattering {
    /// Specular (direct in, direct out).
    DirectDirect,
    /// Direct in, everything out (specular plus scattered).
    DirectHemispherical,
    /// Diffuse in, diffuse out.
    DiffuseDiffuse,
}

/// Transmittance and reflectance seen from one side.
#[derive(Debug, Clone, PartialEq)]
pub struct SideProperties<Op> {
    pub t: Op,
    pub r: Op,
}

/// An optical element: front and back transmittance/reflectance operators
/// at a single wavelength (or waveband).
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalElement<Op> {
    front: SideProperties<Op>,
    back: SideProperties<Op>,
}

impl<Op: Operator> OpticalElement<Op> {
    /// Build an element, checking that all four operators share one dimension.
    pub fn new(tf: Op, rf: Op, tb: Op, rb: Op) -> Result<Self, OperatorError> {
        let dim = tf.size();
        check_dim(&rf, dim)?;
        check_dim(&tb, dim)?;
        check_dim(&rb, dim)?;
        Ok(Self {
            front: SideProperties { t: tf, r: rf },
            back: SideProperties { t: tb, r: rb },
        })
    }

    /// Element with identical properties on both faces.
    pub fn symmetric(t: Op, r: Op) -> Result<Self, OperatorError> {
        Self::new(t.clone(), r.clone(), t, r)
    }

    /// The perfect transmitter with zero reflectance in the basis weighted by
    /// `lambda`: $T = \Lambda^{-1}$, $R = 0$, so that $\Lambda T = I$.
    pub fn neutral(lambda: &Op) -> Result<Self, OperatorError> {
        let t = lambda.try_inverse()?;
        let r = Op::zeros(lambda.size());
        Self::symmetric(t, r)
    }

    pub fn size(&self) -> usize {
        self.front.t.size()
    }

    pub fn side(&self, side: Side) -> &SideProperties<Op> {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
        }
    }

    pub fn property(&self, side: Side, property: Property) -> &Op {
        let props = self.side(side);
        match property {
            Property::T => &props.t,
            Property::R => &props.r,
        }
    }

    pub fn t(&self, side: Side) -> &Op {
        &self.side(side).t
    }

    pub fn r(&self, side: Side) -> &Op {
        &self.side(side).r
    }

    /// The same element turned around.
    pub fn flipped(&self) -> Self {
        Self {
            front: self.back.clone(),
            back: self.front.clone(),
        }
    }

    /// Absorptance of the isolated element per incoming direction:
    /// $A = 1 - \mathbf{1}^\mathsf{T}\Lambda T - \mathbf{1}^\mathsf{T}\Lambda R$.
    pub fn absorptance(&self, side: Side, lambda: &Op) -> Op::Vector {
        let props = self.side(side);
        Op::Vector::ones(self.size())
            .minus(&props.t.hemispherical(lambda))
            .minus(&props.r.hemispherical(lambda))
    }
}

/// Per-layer absorptance split by the face through which energy arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsorptanceTerms<V> {
    /// Absorbed from flux arriving at the layer's front face.
    pub front_face: V,
    /// Absorbed from flux arriving at the layer's back face.
    pub back_face: V,
}

impl<V: DirectionVector> AbsorptanceTerms<V> {
    pub fn total(&self) -> V {
        self.front_face.plus(&self.back_face)
    }
}
