//! Multi-waveband orchestrator.
//!
//! [`SpectralStack`] holds the layer sources of one construction and, on
//! the first query after a change, runs [`calculate`](SpectralStack::calculate):
//!
//! 1. resolve every layer at every wavelength of the grid (elements,
//!    isolated absorptance, responsivity) into read-only arrays;
//! 2. submit one task per wavelength to the compute backend; each task
//!    builds its own [`EquivalentStack`] and writes into its own result slot.
//!
//! The result is cached behind a [`ComputeOnce`] gate, so concurrent
//! queries trigger a single calculation.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use multilayer_compute::{default_backend, ComputeBackend, Progress, ProgressCounter};

use crate::cache::{CacheState, ComputeOnce};
use crate::operator::{DirectionVector, Operator};
use crate::stack::{EquivalentStack, StackError, StackLayer};
use crate::types::{OpticalElement, Property, Side};

use super::integrate::{weighted_average, weighted_integral};
use super::{common_wavelengths, LayerSource, Spectrum};

/// Results at one wavelength.
#[derive(Debug)]
struct BandResult<Op: Operator> {
    equivalent: OpticalElement<Op>,
    /// Per layer, `[front incidence, back incidence]`.
    absorptance: Vec<[Op::Vector; 2]>,
    current: Vec<Option<[Op::Vector; 2]>>,
}

#[derive(Debug)]
struct SpectralSolution<Op: Operator> {
    wavelengths: Vec<f64>,
    irradiance: Vec<f64>,
    bands: Vec<BandResult<Op>>,
}

/// A stack of spectrally resolved layers.
pub struct SpectralStack<Op: Operator> {
    lambda: Op,
    layers: Vec<Arc<dyn LayerSource<Op>>>,
    wavelengths: Option<Vec<f64>>,
    source: Option<Spectrum>,
    backend: Arc<dyn ComputeBackend>,
    cache: ComputeOnce<SpectralSolution<Op>>,
}

impl<Op: Operator> SpectralStack<Op> {
    pub fn new(lambda: Op, first: Arc<dyn LayerSource<Op>>) -> Self {
        Self {
            lambda,
            layers: vec![first],
            wavelengths: None,
            source: None,
            backend: default_backend(),
            cache: ComputeOnce::new(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn ComputeBackend>) -> Self {
        self.backend = backend;
        self.cache.invalidate();
        self
    }

    /// Add a layer in front of or behind the current stack.
    pub fn add_layer(&mut self, layer: Arc<dyn LayerSource<Op>>, side: Side) {
        match side {
            Side::Front => self.layers.insert(0, layer),
            Side::Back => self.layers.push(layer),
        }
        self.cache.invalidate();
    }

    /// Use `grid` instead of the common grid of the layers.
    ///
    /// # Errors
    /// [`StackError::InvalidWavelengthGrid`] unless `grid` is non-empty,
    /// finite and strictly increasing. The previous grid is kept.
    pub fn set_wavelengths(&mut self, grid: Vec<f64>) -> Result<(), StackError> {
        validate_grid(&grid)?;
        self.wavelengths = Some(grid);
        self.cache.invalidate();
        Ok(())
    }

    /// Replace the source spectrum used for integrated totals. Without one,
    /// every wavelength is weighted equally.
    pub fn set_source_spectrum(&mut self, spectrum: Spectrum) {
        self.source = Some(spectrum);
        self.cache.invalidate();
    }

    pub fn lambda(&self) -> &Op {
        &self.lambda
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Number of calculations run so far.
    pub fn computations(&self) -> usize {
        self.cache.computations()
    }

    /// Run the per-wavelength calculation unless a cached result exists.
    pub fn calculate(&self) -> Result<(), StackError> {
        self.solution(None).map(|_| ())
    }

    /// As [`calculate`](Self::calculate), reporting each finished wavelength.
    /// The callback may be invoked from worker threads.
    ///
    /// The calculation holds the result cache locked while the callback runs,
    /// so the callback must not query results from this stack: such a query
    /// waits on the lock and deadlocks. [`cache_state`](Self::cache_state)
    /// does not block and is safe.
    pub fn calculate_with_progress(
        &self,
        progress: &(dyn Fn(Progress) + Sync),
    ) -> Result<(), StackError> {
        self.solution(Some(progress)).map(|_| ())
    }

    pub fn wavelengths(&self) -> Result<Vec<f64>, StackError> {
        Ok(self.solution(None)?.wavelengths.clone())
    }

    pub fn transmittance(&self, side: Side) -> Result<Vec<Op>, StackError> {
        self.property_series(side, Property::T)
    }

    pub fn reflectance(&self, side: Side) -> Result<Vec<Op>, StackError> {
        self.property_series(side, Property::R)
    }

    /// Absorptance of layer `index` (1-based) at every wavelength.
    pub fn absorptance(&self, index: usize, side: Side) -> Result<Vec<Op::Vector>, StackError> {
        let i = self.position(index)?;
        let solution = self.solution(None)?;
        Ok(solution
            .bands
            .iter()
            .map(|band| band.absorptance[i][side.index()].clone())
            .collect())
    }

    /// Photovoltaic current of layer `index` per unit irradiance at every
    /// wavelength, `None` for passive layers.
    pub fn current(&self, index: usize, side: Side) -> Result<Option<Vec<Op::Vector>>, StackError> {
        let i = self.position(index)?;
        let solution = self.solution(None)?;
        Ok(solution
            .bands
            .iter()
            .map(|band| band.current[i].as_ref().map(|c| c[side.index()].clone()))
            .collect())
    }

    /// Source-weighted hemispherical transmittance for incoming `direction`.
    pub fn total_transmittance(
        &self,
        side: Side,
        direction: usize,
        range: RangeInclusive<f64>,
    ) -> Result<f64, StackError> {
        self.total_property(side, Property::T, direction, range)
    }

    pub fn total_reflectance(
        &self,
        side: Side,
        direction: usize,
        range: RangeInclusive<f64>,
    ) -> Result<f64, StackError> {
        self.total_property(side, Property::R, direction, range)
    }

    pub fn total_absorptance(
        &self,
        index: usize,
        side: Side,
        direction: usize,
        range: RangeInclusive<f64>,
    ) -> Result<f64, StackError> {
        let series = self.absorptance(index, side)?;
        let values = components(&series, direction)?;
        let solution = self.solution(None)?;
        weighted_average(&solution.wavelengths, &values, &solution.irradiance, &range)
    }

    /// $\int j(\lambda) E(\lambda)\,d\lambda$ for layer `index`; `None` for
    /// passive layers.
    pub fn total_current(
        &self,
        index: usize,
        side: Side,
        direction: usize,
        range: RangeInclusive<f64>,
    ) -> Result<Option<f64>, StackError> {
        let Some(series) = self.current(index, side)? else {
            return Ok(None);
        };
        let values = components(&series, direction)?;
        let solution = self.solution(None)?;
        weighted_integral(&solution.wavelengths, &values, &solution.irradiance, &range).map(Some)
    }

    fn property_series(&self, side: Side, property: Property) -> Result<Vec<Op>, StackError> {
        let solution = self.solution(None)?;
        Ok(solution
            .bands
            .iter()
            .map(|band| band.equivalent.property(side, property).clone())
            .collect())
    }

    fn total_property(
        &self,
        side: Side,
        property: Property,
        direction: usize,
        range: RangeInclusive<f64>,
    ) -> Result<f64, StackError> {
        let solution = self.solution(None)?;
        let series: Vec<Op::Vector> = solution
            .bands
            .iter()
            .map(|band| band.equivalent.property(side, property).hemispherical(&self.lambda))
            .collect();
        let values = components(&series, direction)?;
        weighted_average(&solution.wavelengths, &values, &solution.irradiance, &range)
    }

    fn position(&self, index: usize) -> Result<usize, StackError> {
        let count = self.layers.len();
        if index == 0 || index > count {
            return Err(StackError::LayerIndexOutOfRange { index, count });
        }
        Ok(index - 1)
    }

    fn solution(
        &self,
        progress: Option<&(dyn Fn(Progress) + Sync)>,
    ) -> Result<Arc<SpectralSolution<Op>>, StackError> {
        self.cache.get_or_try_compute(|| self.solve(progress))
    }

    fn solve(
        &self,
        progress: Option<&(dyn Fn(Progress) + Sync)>,
    ) -> Result<SpectralSolution<Op>, StackError> {
        let wavelengths = match &self.wavelengths {
            Some(grid) => grid.clone(),
            None => common_wavelengths(&self.layers)?,
        };
        let count = wavelengths.len();
        log::info!(
            "Calculating {} layers at {} wavelengths on {}",
            self.layers.len(),
            count,
            self.backend.device_info().name
        );

        // Step 1: resolve all layers on the grid up front.
        let inputs = self
            .layers
            .iter()
            .map(|source| resolve_layer(source.as_ref(), &self.lambda, &wavelengths))
            .collect::<Result<Vec<_>, _>>()?;

        // Step 2: one independent task per wavelength.
        let slots: Vec<OnceLock<Result<BandResult<Op>, StackError>>> =
            (0..count).map(|_| OnceLock::new()).collect();
        let failed = AtomicBool::new(false);
        let counter = ProgressCounter::new(count, progress);
        let lambda = &self.lambda;

        self.backend.run_indexed(count, &|w| {
            if failed.load(Ordering::Relaxed) {
                return;
            }
            let result = solve_band(lambda, &inputs, w);
            if result.is_err() {
                failed.store(true, Ordering::Relaxed);
            }
            // Each index is visited once, so the slot is always empty here.
            let _ = slots[w].set(result);
            counter.tick();
        });

        if failed.into_inner() {
            let error = slots
                .into_iter()
                .find_map(|slot| slot.into_inner().and_then(Result::err));
            return Err(error.unwrap_or_else(|| StackError::Compute("wavelength task failed".into())));
        }

        let bands = slots
            .into_iter()
            .enumerate()
            .map(|(w, slot)| {
                slot.into_inner().unwrap_or_else(|| {
                    Err(StackError::Compute(format!(
                        "backend skipped wavelength index {w}"
                    )))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let irradiance = match &self.source {
            Some(spectrum) => spectrum.resample(&wavelengths),
            None => vec![1.0; count],
        };

        Ok(SpectralSolution {
            wavelengths,
            irradiance,
            bands,
        })
    }
}

/// A layer resolved at every grid wavelength.
fn resolve_layer<Op: Operator>(
    source: &dyn LayerSource<Op>,
    lambda: &Op,
    wavelengths: &[f64],
) -> Result<Vec<StackLayer<Op>>, StackError> {
    wavelengths
        .iter()
        .map(|&wl| {
            let element = source.element(wl)?;
            let dim = element.size();
            let layer = StackLayer::new(element, lambda);
            let front = source.responsivity(wl, Side::Front)?;
            let back = source.responsivity(wl, Side::Back)?;
            Ok(match (front, back) {
                (None, None) => layer,
                (front, back) => layer.with_responsivity(
                    front.unwrap_or_else(|| Op::Vector::zeros(dim)),
                    back.unwrap_or_else(|| Op::Vector::zeros(dim)),
                ),
            })
        })
        .collect()
}

fn solve_band<Op: Operator>(
    lambda: &Op,
    inputs: &[Vec<StackLayer<Op>>],
    w: usize,
) -> Result<BandResult<Op>, StackError> {
    let mut stack = EquivalentStack::new(lambda.clone());
    for layer in inputs {
        stack.insert(layer[w].clone(), Side::Back)?;
    }

    let equivalent = stack.equivalent()?;
    let mut absorptance = Vec::with_capacity(inputs.len());
    let mut current = Vec::with_capacity(inputs.len());
    for index in 1..=stack.len() {
        absorptance.push([
            stack.layer_absorptance(index, Side::Front)?,
            stack.layer_absorptance(index, Side::Back)?,
        ]);
        let front = stack.layer_current(index, Side::Front)?;
        let back = stack.layer_current(index, Side::Back)?;
        current.push(front.zip(back).map(|(f, b)| [f, b]));
    }

    Ok(BandResult {
        equivalent,
        absorptance,
        current,
    })
}

fn components<V: DirectionVector>(series: &[V], direction: usize) -> Result<Vec<f64>, StackError> {
    series
        .iter()
        .map(|v| {
            v.component(direction).ok_or(StackError::DirectionOutOfRange {
                direction,
                count: v.len(),
            })
        })
        .collect()
}

fn validate_grid(grid: &[f64]) -> Result<(), StackError> {
    if grid.is_empty() {
        return Err(StackError::InvalidWavelengthGrid("grid is empty".into()));
    }
    if let Some(wl) = grid.iter().find(|wl| !wl.is_finite()) {
        return Err(StackError::InvalidWavelengthGrid(format!(
            "non-finite wavelength {wl}"
        )));
    }
    if let Some(i) = (1..grid.len()).find(|&i| grid[i] <= grid[i - 1]) {
        return Err(StackError::InvalidWavelengthGrid(format!(
            "wavelengths must be strictly increasing at index {i} ({} after {})",
            grid[i],
            grid[i - 1]
        )));
    }
    Ok(())
}
