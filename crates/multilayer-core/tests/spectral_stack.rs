//! Integration tests for the multi-wavelength orchestrator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use ndarray::{Array1, Array2};

use multilayer_compute::{CpuBackend, SerialBackend};
use multilayer_core::basis::{DirectionalBasis, NORMAL_DIRECTION};
use multilayer_core::cache::CacheState;
use multilayer_core::operator::Operator;
use multilayer_core::spectral::{common_wavelengths, LayerSource, SpectralStack, Spectrum};
use multilayer_core::stack::{EquivalentStack, StackError};
use multilayer_core::types::{OpticalElement, Side};

// ─────────────────────────────────────────────────────────────
// Test layers
// ─────────────────────────────────────────────────────────────

/// Specular pane whose transmittance drifts linearly with wavelength.
struct Pane {
    name: String,
    grid: Vec<f64>,
    t0: f64,
    slope: f64,
    rf: f64,
    rb: f64,
    responsivity: Option<f64>,
    lookups: AtomicUsize,
}

impl Pane {
    fn new(name: &str, grid: Vec<f64>, t0: f64, rf: f64, rb: f64) -> Self {
        Self {
            name: name.to_string(),
            grid,
            t0,
            slope: 0.0,
            rf,
            rb,
            responsivity: None,
            lookups: AtomicUsize::new(0),
        }
    }

    fn with_slope(mut self, slope: f64) -> Self {
        self.slope = slope;
        self
    }

    fn with_responsivity(mut self, amps_per_watt: f64) -> Self {
        self.responsivity = Some(amps_per_watt);
        self
    }

    fn t(&self, wl: f64) -> f64 {
        self.t0 + self.slope * (wl - self.grid[0])
    }
}

impl LayerSource<f64> for Pane {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelengths(&self) -> Vec<f64> {
        self.grid.clone()
    }

    fn element(&self, wl: f64) -> Result<OpticalElement<f64>, StackError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let t = self.t(wl);
        Ok(OpticalElement::new(t, self.rf, t, self.rb)?)
    }

    fn responsivity(&self, _wl: f64, side: Side) -> Result<Option<f64>, StackError> {
        Ok(self.responsivity.filter(|_| side == Side::Front))
    }
}

/// The same pane as a diagonal BSDF in a directional basis.
struct MatrixPane {
    pane: Pane,
    lambda: Array2<f64>,
}

impl LayerSource<Array2<f64>> for MatrixPane {
    fn name(&self) -> &str {
        self.pane.name()
    }

    fn wavelengths(&self) -> Vec<f64> {
        self.pane.wavelengths()
    }

    fn element(&self, wl: f64) -> Result<OpticalElement<Array2<f64>>, StackError> {
        let inv = self.lambda.diag().mapv(|l| 1.0 / l);
        let diag = |v: f64| Array2::from_diag(&(&inv * v));
        let t = self.pane.t(wl);
        Ok(OpticalElement::new(diag(t), diag(self.pane.rf), diag(t), diag(self.pane.rb))?)
    }
}

/// A layer that fails at one wavelength.
struct Broken;

impl LayerSource<f64> for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn wavelengths(&self) -> Vec<f64> {
        grid(400.0, 800.0, 9)
    }

    fn element(&self, wl: f64) -> Result<OpticalElement<f64>, StackError> {
        if wl == 600.0 {
            return Err(StackError::LayerSource {
                layer: "broken".into(),
                message: "no data at 600 nm".into(),
            });
        }
        Ok(OpticalElement::symmetric(0.9, 0.05)?)
    }
}

fn grid(start: f64, end: f64, n: usize) -> Vec<f64> {
    let step = (end - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

fn glazing(backend: Option<Arc<dyn multilayer_compute::ComputeBackend>>) -> SpectralStack<f64> {
    let outer = Pane::new("outer", grid(400.0, 800.0, 41), 0.8, 0.1, 0.1).with_slope(1e-4);
    let inner = Pane::new("inner", grid(400.0, 800.0, 21), 0.7, 0.15, 0.12).with_slope(-2e-4);
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(outer));
    stack.add_layer(Arc::new(inner), Side::Back);
    match backend {
        Some(b) => stack.with_backend(b),
        None => stack,
    }
}

// ─────────────────────────────────────────────────────────────
// Wavelength grid
// ─────────────────────────────────────────────────────────────

#[test]
fn test_common_grid_is_union_over_overlap() {
    let a: Arc<dyn LayerSource<f64>> = Arc::new(Pane::new("a", vec![400.0, 500.0, 600.0, 700.0], 0.8, 0.1, 0.1));
    let b: Arc<dyn LayerSource<f64>> = Arc::new(Pane::new("b", vec![450.0, 550.0, 650.0, 750.0], 0.8, 0.1, 0.1));
    let grid = common_wavelengths(&[a, b]).unwrap();
    assert_eq!(grid, vec![450.0, 500.0, 550.0, 600.0, 650.0, 700.0]);
}

#[test]
fn test_disjoint_layers_have_no_common_grid() {
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(Pane::new("uv", vec![300.0, 350.0], 0.8, 0.1, 0.1)));
    stack.add_layer(Arc::new(Pane::new("ir", vec![900.0, 1000.0], 0.8, 0.1, 0.1)), Side::Back);
    assert_eq!(stack.calculate(), Err(StackError::NoCommonWavelengths));
}

#[test]
fn test_grid_override_replaces_common_grid() {
    // T(λ) = λ / 1000
    let pane = Pane::new("pane", vec![400.0, 800.0], 0.4, 0.0, 0.0).with_slope(1e-3);
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(pane));
    stack.set_wavelengths(vec![400.0, 600.0, 800.0]).unwrap();
    assert_eq!(stack.wavelengths().unwrap(), vec![400.0, 600.0, 800.0]);
    let total = stack.total_transmittance(Side::Front, 0, 400.0..=800.0).unwrap();
    assert_relative_eq!(total, 0.6, epsilon = 1e-12);
}

#[test]
fn test_malformed_grid_override_is_rejected() {
    let pane = Pane::new("pane", vec![400.0, 800.0], 0.4, 0.0, 0.0).with_slope(1e-3);
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(pane));
    for bad in [
        vec![800.0, 400.0, 600.0, 600.0],
        vec![400.0, 600.0, 600.0],
        vec![],
        vec![400.0, f64::NAN],
    ] {
        assert!(matches!(
            stack.set_wavelengths(bad),
            Err(StackError::InvalidWavelengthGrid(_))
        ));
    }

    // The layer grid is still in use.
    assert_eq!(stack.wavelengths().unwrap(), vec![400.0, 800.0]);
    let total = stack.total_transmittance(Side::Front, 0, 400.0..=800.0).unwrap();
    assert_relative_eq!(total, 0.6, epsilon = 1e-12);
}

// ─────────────────────────────────────────────────────────────
// Per-wavelength results
// ─────────────────────────────────────────────────────────────

#[test]
fn test_series_match_single_band_stacks() {
    let stack = glazing(None);
    let wavelengths = stack.wavelengths().unwrap();
    assert_eq!(wavelengths.len(), 41);

    let tau = stack.transmittance(Side::Front).unwrap();
    let absorbed = stack.absorptance(2, Side::Back).unwrap();
    for (w, &wl) in wavelengths.iter().enumerate() {
        let t1 = 0.8 + 1e-4 * (wl - 400.0);
        let t2 = 0.7 - 2e-4 * (wl - 400.0);
        let mut single = EquivalentStack::new(1.0);
        single.add_layer(OpticalElement::new(t1, 0.1, t1, 0.1).unwrap(), Side::Back).unwrap();
        single.add_layer(OpticalElement::new(t2, 0.15, t2, 0.12).unwrap(), Side::Back).unwrap();

        assert_relative_eq!(tau[w], single.tau(Side::Front).unwrap(), epsilon = 1e-14);
        assert_relative_eq!(absorbed[w], single.layer_absorptance(2, Side::Back).unwrap(), epsilon = 1e-14);
    }
}

#[test]
fn test_energy_balance_at_every_wavelength() {
    let stack = glazing(None);
    for side in Side::ALL {
        let t = stack.transmittance(side).unwrap();
        let r = stack.reflectance(side).unwrap();
        let a1 = stack.absorptance(1, side).unwrap();
        let a2 = stack.absorptance(2, side).unwrap();
        for w in 0..t.len() {
            assert_relative_eq!(t[w] + r[w] + a1[w] + a2[w], 1.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_serial_and_parallel_results_are_identical() {
    let serial = glazing(Some(Arc::new(SerialBackend)));
    let parallel = glazing(Some(Arc::new(CpuBackend::with_threads(4).unwrap())));

    for side in Side::ALL {
        assert_eq!(serial.transmittance(side).unwrap(), parallel.transmittance(side).unwrap());
        assert_eq!(serial.reflectance(side).unwrap(), parallel.reflectance(side).unwrap());
        for index in 1..=2 {
            assert_eq!(
                serial.absorptance(index, side).unwrap(),
                parallel.absorptance(index, side).unwrap()
            );
        }
    }
}

#[test]
fn test_matrix_layers_run_per_wavelength() {
    let basis = DirectionalBasis::klems_quarter();
    let lambda = basis.lambda();
    let outer = MatrixPane {
        pane: Pane::new("outer", grid(400.0, 800.0, 5), 0.8, 0.1, 0.1),
        lambda: lambda.clone(),
    };
    let inner = MatrixPane {
        pane: Pane::new("inner", grid(400.0, 800.0, 5), 0.7, 0.15, 0.15),
        lambda: lambda.clone(),
    };
    let mut stack = SpectralStack::new(lambda.clone(), Arc::new(outer));
    stack.add_layer(Arc::new(inner), Side::Back);

    let tau = stack.transmittance(Side::Front).unwrap();
    assert_eq!(tau.len(), 5);
    let expected = 0.8 * 0.7 / (1.0 - 0.1 * 0.15);
    let hemispherical: Array1<f64> = tau[2].hemispherical(&lambda);
    assert_relative_eq!(hemispherical[NORMAL_DIRECTION], expected, epsilon = 1e-10);

    let total = stack.total_transmittance(Side::Front, 40, 400.0..=800.0).unwrap();
    assert_relative_eq!(total, expected, epsilon = 1e-10);
    assert!(matches!(
        stack.total_transmittance(Side::Front, 41, 400.0..=800.0),
        Err(StackError::DirectionOutOfRange { direction: 41, count: 41 })
    ));
}

// ─────────────────────────────────────────────────────────────
// Integration
// ─────────────────────────────────────────────────────────────

#[test]
fn test_flat_source_weights_evenly() {
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(Pane::new("pane", grid(400.0, 800.0, 5), 0.8, 0.1, 0.1)));
    let total = stack.total_transmittance(Side::Front, 0, 400.0..=800.0).unwrap();
    assert_relative_eq!(total, 0.8, epsilon = 1e-12);

    // Doubling a constant source changes nothing.
    stack.set_source_spectrum(Spectrum::flat(300.0, 900.0, 2.0).unwrap());
    let total = stack.total_transmittance(Side::Front, 0, 400.0..=800.0).unwrap();
    assert_relative_eq!(total, 0.8, epsilon = 1e-12);
}

#[test]
fn test_source_spectrum_shifts_weighting() {
    let mut stack =
        SpectralStack::<f64>::new(1.0, Arc::new(Pane::new("pane", vec![400.0, 800.0], 0.5, 0.1, 0.1).with_slope(1e-3)));
    let flat = stack.total_transmittance(Side::Front, 0, 400.0..=800.0).unwrap();
    assert_relative_eq!(flat, 0.7, epsilon = 1e-12);

    // All source energy at the red end pulls the total towards T(800).
    stack.set_source_spectrum(Spectrum::new(vec![400.0, 800.0], vec![0.0, 1.0]).unwrap());
    let red = stack.total_transmittance(Side::Front, 0, 400.0..=800.0).unwrap();
    assert!(red > flat);
}

#[test]
fn test_single_wavelength_range_returns_point_value() {
    let stack = glazing(None);
    let wavelengths = stack.wavelengths().unwrap();
    let tau = stack.transmittance(Side::Front).unwrap();
    let total = stack.total_transmittance(Side::Front, 0, 500.0..=500.0).unwrap();
    let w = wavelengths.iter().position(|&wl| wl == 500.0).unwrap();
    assert_eq!(total, tau[w]);
}

#[test]
fn test_empty_range_is_an_error() {
    let stack = glazing(None);
    assert!(matches!(
        stack.total_reflectance(Side::Front, 0, 1000.0..=1100.0),
        Err(StackError::EmptyIntegrationRange { .. })
    ));
}

#[test]
fn test_current_integrates_against_source() {
    let pv = Pane::new("cell", grid(400.0, 800.0, 5), 0.0, 0.1, 0.1).with_responsivity(0.5);
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(pv));
    stack.set_source_spectrum(Spectrum::flat(400.0, 800.0, 1.0).unwrap());

    // On its own the cell delivers exactly its responsivity.
    let current = stack.current(1, Side::Front).unwrap().unwrap();
    assert_relative_eq!(current[0], 0.5, epsilon = 1e-15);
    let total = stack.total_current(1, Side::Front, 0, 400.0..=800.0).unwrap().unwrap();
    assert_relative_eq!(total, 0.5 * 400.0, epsilon = 1e-9);

    // The back side has no responsivity; it is filled with zeros.
    let back = stack.total_current(1, Side::Back, 0, 400.0..=800.0).unwrap().unwrap();
    assert_eq!(back, 0.0);
}

#[test]
fn test_passive_layer_has_no_current() {
    let stack = glazing(None);
    assert_eq!(stack.current(1, Side::Front).unwrap(), None);
    assert_eq!(stack.total_current(2, Side::Back, 0, 400.0..=800.0).unwrap(), None);
}

// ─────────────────────────────────────────────────────────────
// Caching and progress
// ─────────────────────────────────────────────────────────────

#[test]
fn test_results_are_cached_until_changed() {
    let mut stack = glazing(None);
    assert_eq!(stack.cache_state(), CacheState::Dirty);

    let first = stack.transmittance(Side::Front).unwrap();
    let _ = stack.absorptance(1, Side::Front).unwrap();
    let _ = stack.total_reflectance(Side::Back, 0, 400.0..=800.0).unwrap();
    assert_eq!(stack.computations(), 1);
    assert_eq!(stack.cache_state(), CacheState::Fresh);
    assert_eq!(stack.transmittance(Side::Front).unwrap(), first);

    stack.add_layer(Arc::new(Pane::new("low-e", grid(400.0, 800.0, 11), 0.9, 0.05, 0.2)), Side::Front);
    assert_eq!(stack.cache_state(), CacheState::Dirty);
    assert_eq!(stack.layer_names(), vec!["low-e", "outer", "inner"]);
    let changed = stack.transmittance(Side::Front).unwrap();
    assert_eq!(stack.computations(), 2);
    assert!(changed[0] < first[0]);

    stack.set_source_spectrum(Spectrum::flat(400.0, 800.0, 1.0).unwrap());
    stack.calculate().unwrap();
    assert_eq!(stack.computations(), 3);
}

#[test]
fn test_concurrent_queries_calculate_once() {
    let pane = Arc::new(Pane::new("pane", grid(400.0, 800.0, 101), 0.8, 0.1, 0.1));
    let stack = SpectralStack::<f64>::new(1.0, pane.clone() as Arc<dyn LayerSource<f64>>);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                stack.transmittance(Side::Front).unwrap();
            });
        }
    });

    assert_eq!(stack.computations(), 1);
    assert_eq!(pane.lookups.load(Ordering::Relaxed), 101);
}

#[test]
fn test_progress_reports_every_wavelength() {
    let stack = glazing(Some(Arc::new(SerialBackend)));
    let seen = Mutex::new(Vec::new());
    stack
        .calculate_with_progress(&|p| seen.lock().unwrap().push((p.completed, p.total)))
        .unwrap();

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 41);
    assert_eq!(seen.last(), Some(&(41, 41)));
}

#[test]
fn test_progress_callback_sees_calculation_in_progress() {
    // The cache stays locked while the callback runs; only the non-blocking
    // state query is safe from inside it.
    let stack = glazing(Some(Arc::new(SerialBackend)));
    let states = Mutex::new(Vec::new());
    stack
        .calculate_with_progress(&|_| states.lock().unwrap().push(stack.cache_state()))
        .unwrap();

    let states = states.into_inner().unwrap();
    assert_eq!(states.len(), 41);
    assert!(states.iter().all(|&s| s == CacheState::Computing));
    assert_eq!(stack.cache_state(), CacheState::Fresh);
}

// ─────────────────────────────────────────────────────────────
// Failures
// ─────────────────────────────────────────────────────────────

#[test]
fn test_layer_error_fails_the_calculation() {
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(Broken));
    stack.add_layer(Arc::new(Pane::new("pane", grid(400.0, 800.0, 9), 0.8, 0.1, 0.1)), Side::Back);
    let err = stack.calculate().unwrap_err();
    assert!(matches!(err, StackError::LayerSource { ref layer, .. } if layer == "broken"));
    assert!(stack.transmittance(Side::Front).is_err());
}

#[test]
fn test_singular_band_fails_the_calculation() {
    let mut stack = SpectralStack::<f64>::new(1.0, Arc::new(Pane::new("mirror", grid(400.0, 800.0, 9), 0.0, 1.0, 1.0)));
    stack.add_layer(Arc::new(Pane::new("mirror", grid(400.0, 800.0, 9), 0.0, 1.0, 1.0)), Side::Back);
    stack = stack.with_backend(Arc::new(CpuBackend::with_threads(2).unwrap()));
    assert!(matches!(stack.calculate(), Err(StackError::Numerical(_))));
}

#[test]
fn test_layer_index_is_one_based() {
    let stack = glazing(None);
    assert!(matches!(
        stack.absorptance(0, Side::Front),
        Err(StackError::LayerIndexOutOfRange { index: 0, count: 2 })
    ));
    assert!(stack.absorptance(3, Side::Front).is_err());
}
