//! Single-waveband equivalent stack.
//!
//! [`EquivalentStack`] owns an ordered list of layers, front to back, and
//! lazily computes
//!
//! - the whole-stack equivalent element, by folding [`combine`] over the
//!   layers;
//! - for every layer and both incidence sides, the absorptance split into
//!   the part arriving through the layer's front face and the part arriving
//!   through its back face;
//! - the same split for photovoltaic current, for layers that carry a
//!   responsivity vector.
//!
//! Forward partial stacks $F_i$ (layers $1..i$) and backward partial stacks
//! $B_i$ (layers $i..k$) are stored in dense vectors alongside the layers and
//! dropped wholesale whenever a layer is added.
//!
//! Layer indices in the public API start at 1.

use std::sync::Arc;

use crate::cache::ComputeOnce;
use crate::operator::{check_dim, DirectionVector, Operator, OperatorError};
use crate::types::{AbsorptanceTerms, OpticalElement, Side};

use super::absorptance::Incidence;
use super::{combine, StackError};

/// A layer as stored in the stack: its element plus the per-direction
/// vectors propagated to absorptance and current.
#[derive(Debug, Clone)]
pub struct StackLayer<Op: Operator> {
    element: OpticalElement<Op>,
    /// Isolated absorptance, `[front, back]`.
    absorptance: [Op::Vector; 2],
    /// Photovoltaic responsivity, `[front, back]`.
    responsivity: Option<[Op::Vector; 2]>,
}

impl<Op: Operator> StackLayer<Op> {
    /// Layer whose isolated absorptance is derived from its own
    /// transmittance and reflectance.
    pub fn new(element: OpticalElement<Op>, lambda: &Op) -> Self {
        let absorptance = [
            element.absorptance(Side::Front, lambda),
            element.absorptance(Side::Back, lambda),
        ];
        Self {
            element,
            absorptance,
            responsivity: None,
        }
    }

    /// Replace the isolated absorptance with externally supplied vectors.
    pub fn with_absorptance(mut self, front: Op::Vector, back: Op::Vector) -> Self {
        self.absorptance = [front, back];
        self
    }

    pub fn with_responsivity(mut self, front: Op::Vector, back: Op::Vector) -> Self {
        self.responsivity = Some([front, back]);
        self
    }

    pub fn element(&self) -> &OpticalElement<Op> {
        &self.element
    }

    pub fn isolated_absorptance(&self, side: Side) -> &Op::Vector {
        &self.absorptance[side.index()]
    }

    fn validate(&self, dim: usize) -> Result<(), OperatorError> {
        check_dim(self.element.t(Side::Front), dim)?;
        let vectors = self.absorptance.iter().chain(self.responsivity.iter().flatten());
        for v in vectors {
            if v.len() != dim {
                return Err(OperatorError::DimensionMismatch {
                    expected: dim,
                    found: v.len(),
                });
            }
        }
        Ok(())
    }
}

/// Everything computed for one state of the stack.
#[derive(Debug)]
struct StackSolution<Op: Operator> {
    equivalent: OpticalElement<Op>,
    /// `forward[i]`: layers `0..=i` (0-based).
    forward: Vec<OpticalElement<Op>>,
    /// `backward[i]`: layers `i..k` (0-based).
    backward: Vec<OpticalElement<Op>>,
    /// Per layer, `[front incidence, back incidence]`.
    absorptance: Vec<[AbsorptanceTerms<Op::Vector>; 2]>,
    current: Vec<Option<[AbsorptanceTerms<Op::Vector>; 2]>>,
}

/// Equivalent-layer calculator for one waveband.
pub struct EquivalentStack<Op: Operator> {
    lambda: Op,
    layers: Vec<StackLayer<Op>>,
    cache: ComputeOnce<StackSolution<Op>>,
}

impl<Op: Operator> EquivalentStack<Op> {
    /// Empty stack in the basis weighted by `lambda`.
    pub fn new(lambda: Op) -> Self {
        Self {
            lambda,
            layers: Vec::new(),
            cache: ComputeOnce::new(),
        }
    }

    /// Stack seeded with its first layer.
    pub fn with_layer(lambda: Op, element: OpticalElement<Op>) -> Result<Self, StackError> {
        let mut stack = Self::new(lambda);
        stack.add_layer(element, Side::Back)?;
        Ok(stack)
    }

    /// Add a layer in front of (`Side::Front`) or behind (`Side::Back`) the
    /// current stack.
    pub fn add_layer(&mut self, element: OpticalElement<Op>, side: Side) -> Result<(), StackError> {
        let layer = StackLayer::new(element, &self.lambda);
        self.insert(layer, side)
    }

    /// Add a fully specified layer. Prepending renumbers existing layers.
    pub fn insert(&mut self, layer: StackLayer<Op>, side: Side) -> Result<(), StackError> {
        layer.validate(self.lambda.size())?;
        match side {
            Side::Front => self.layers.insert(0, layer),
            Side::Back => self.layers.push(layer),
        }
        self.cache.invalidate();
        Ok(())
    }

    pub fn lambda(&self) -> &Op {
        &self.lambda
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, index: usize) -> Result<&StackLayer<Op>, StackError> {
        let i = self.position(index)?;
        Ok(&self.layers[i])
    }

    /// Whole-stack equivalent element. An empty stack is the perfect
    /// transmitter.
    pub fn equivalent(&self) -> Result<OpticalElement<Op>, StackError> {
        Ok(self.solution()?.equivalent.clone())
    }

    pub fn tau(&self, side: Side) -> Result<Op, StackError> {
        Ok(self.solution()?.equivalent.t(side).clone())
    }

    pub fn rho(&self, side: Side) -> Result<Op, StackError> {
        Ok(self.solution()?.equivalent.r(side).clone())
    }

    /// Equivalent element of layers `first..=last` as cached during the
    /// solve; only whole prefixes (`first == 1`) and suffixes (`last == k`)
    /// are available. Other in-range spans give
    /// [`StackError::PartialStackUnavailable`].
    pub fn partial(&self, first: usize, last: usize) -> Result<OpticalElement<Op>, StackError> {
        let count = self.layers.len();
        let (a, b) = (self.position(first)?, self.position(last)?);
        let solution = self.solution()?;
        if a == 0 {
            return Ok(solution.forward[b].clone());
        }
        if b + 1 == count && a <= b {
            return Ok(solution.backward[a].clone());
        }
        Err(StackError::PartialStackUnavailable { first, last, count })
    }

    /// Absorptance of layer `index` for light incident on the stack's `side`.
    pub fn layer_absorptance(&self, index: usize, side: Side) -> Result<Op::Vector, StackError> {
        Ok(self.layer_absorptance_terms(index, side)?.total())
    }

    /// Absorptance of layer `index` split by the face the energy came through.
    pub fn layer_absorptance_terms(
        &self,
        index: usize,
        side: Side,
    ) -> Result<AbsorptanceTerms<Op::Vector>, StackError> {
        let i = self.position(index)?;
        Ok(self.solution()?.absorptance[i][side.index()].clone())
    }

    /// Photovoltaic current of layer `index`, `None` when the layer has no
    /// responsivity.
    pub fn layer_current(&self, index: usize, side: Side) -> Result<Option<Op::Vector>, StackError> {
        Ok(self
            .layer_current_terms(index, side)?
            .map(|terms| terms.total()))
    }

    pub fn layer_current_terms(
        &self,
        index: usize,
        side: Side,
    ) -> Result<Option<AbsorptanceTerms<Op::Vector>>, StackError> {
        let i = self.position(index)?;
        Ok(self.solution()?.current[i]
            .as_ref()
            .map(|terms| terms[side.index()].clone()))
    }

    /// Number of times the stack has been solved; getters reuse the cached
    /// solution until a layer is added.
    pub fn computations(&self) -> usize {
        self.cache.computations()
    }

    fn position(&self, index: usize) -> Result<usize, StackError> {
        let count = self.layers.len();
        if index == 0 || index > count {
            return Err(StackError::LayerIndexOutOfRange { index, count });
        }
        Ok(index - 1)
    }

    fn solution(&self) -> Result<Arc<StackSolution<Op>>, StackError> {
        self.cache.get_or_try_compute(|| self.solve())
    }

    fn solve(&self) -> Result<StackSolution<Op>, StackError> {
        let lambda = &self.lambda;
        let layers = &self.layers;
        let k = layers.len();
        log::debug!("Solving equivalent stack of {} layers (N = {})", k, lambda.size());

        let Some(first) = layers.first() else {
            return Ok(StackSolution {
                equivalent: OpticalElement::neutral(lambda)?,
                forward: Vec::new(),
                backward: Vec::new(),
                absorptance: Vec::new(),
                current: Vec::new(),
            });
        };

        let mut forward = Vec::with_capacity(k);
        forward.push(first.element.clone());
        for layer in &layers[1..] {
            let next = combine(&forward[forward.len() - 1], &layer.element, lambda)?;
            forward.push(next);
        }

        let mut backward = Vec::with_capacity(k);
        backward.push(layers[k - 1].element.clone());
        for layer in layers[..k - 1].iter().rev() {
            let next = combine(&layer.element, &backward[backward.len() - 1], lambda)?;
            backward.push(next);
        }
        backward.reverse();

        let mut absorptance = Vec::with_capacity(k);
        let mut current = Vec::with_capacity(k);
        for (i, layer) in layers.iter().enumerate() {
            let before = i.checked_sub(1).map(|j| &forward[j]);
            let after = backward.get(i + 1);
            let element = &layer.element;

            let front_paths = Incidence {
                preceding: before.map(|f| (f.t(Side::Front), f.r(Side::Back))),
                remainder_r: backward[i].r(Side::Front),
                layer_t: element.t(Side::Front),
                layer_r: element.r(Side::Back),
                following_r: after.map(|b| b.r(Side::Front)),
            }
            .flux_paths(lambda)?;

            let back_paths = Incidence {
                preceding: after.map(|b| (b.t(Side::Back), b.r(Side::Front))),
                remainder_r: forward[i].r(Side::Back),
                layer_t: element.t(Side::Back),
                layer_r: element.r(Side::Front),
                following_r: before.map(|f| f.r(Side::Back)),
            }
            .flux_paths(lambda)?;

            let split = |vectors: &[Op::Vector; 2]| {
                let [front, back] = vectors;
                let (front_face, back_face) = front_paths.project(front, back);
                let from_front = AbsorptanceTerms { front_face, back_face };
                let (back_face, front_face) = back_paths.project(back, front);
                let from_back = AbsorptanceTerms { front_face, back_face };
                [from_front, from_back]
            };

            absorptance.push(split(&layer.absorptance));
            current.push(layer.responsivity.as_ref().map(split));
        }

        Ok(StackSolution {
            equivalent: forward[k - 1].clone(),
            forward,
            backward,
            absorptance,
            current,
        })
    }
}
