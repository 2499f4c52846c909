//! Job runner: builds the stack from the configuration, runs the spectral
//! calculation, and writes the results.

use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ndarray::Array2;
use serde::Serialize;

use multilayer_compute::{backend_by_name, ComputeBackend, Progress};
use multilayer_core::basis::{DirectionalBasis, NORMAL_DIRECTION};
use multilayer_core::operator::{DirectionVector, Operator};
use multilayer_core::spectral::{LayerSource, SpectralStack, Spectrum};
use multilayer_core::types::Side;
use multilayer_materials::{BsdfLayer, PhotovoltaicLayer, SpecularLayer, SpecularSample};

use crate::config::{BasisKind, JobConfig, LayerConfig, LayerKind, SpectrumConfig};

/// Stack properties at one wavelength, for the reported incidence direction.
#[derive(Debug, Serialize)]
pub struct SpectrumRow {
    pub wavelength_nm: f64,
    pub t_front: f64,
    pub r_front: f64,
    pub t_back: f64,
    pub r_back: f64,
    /// Per layer, light incident on the front of the stack.
    pub absorptance_front: Vec<f64>,
    /// Per layer, light incident on the back of the stack.
    pub absorptance_back: Vec<f64>,
    /// Per layer current per unit irradiance (A/W), front incidence;
    /// `None` for passive layers.
    pub current_front: Vec<Option<f64>>,
}

/// Source-weighted totals over the integration range.
#[derive(Debug, Serialize)]
pub struct Totals {
    pub range_nm: [f64; 2],
    pub t_front: f64,
    pub r_front: f64,
    pub t_back: f64,
    pub r_back: f64,
    pub absorptance_front: Vec<f64>,
    pub absorptance_back: Vec<f64>,
    /// $\int j E\,d\lambda$ per layer (A/m² for a source in W/(m²·nm)).
    pub current_front: Vec<Option<f64>>,
}

/// Results of a job run.
#[derive(Debug, Serialize)]
pub struct StackOutput {
    pub layers: Vec<String>,
    /// Index of the incidence direction reported (0 = normal).
    pub direction: usize,
    pub spectra: Vec<SpectrumRow>,
    pub totals: Totals,
}

/// A stack built from a job, in the operator type its basis calls for.
pub enum Construction {
    Scalar(SpectralStack<f64>),
    Directional {
        basis: DirectionalBasis,
        stack: SpectralStack<Array2<f64>>,
    },
}

impl Construction {
    pub fn layer_names(&self) -> Vec<&str> {
        match self {
            Construction::Scalar(stack) => stack.layer_names(),
            Construction::Directional { stack, .. } => stack.layer_names(),
        }
    }
}

/// Build the stack described by `job` without running it.
pub fn build_construction(job: &JobConfig) -> Result<Construction> {
    let backend = create_backend(job)?;
    match job.stack.basis {
        BasisKind::Scalar => {
            let layers = job
                .layers
                .iter()
                .map(scalar_layer)
                .collect::<Result<Vec<_>>>()?;
            Ok(Construction::Scalar(assemble(1.0, layers, job, backend)?))
        }
        BasisKind::KlemsQuarter => {
            let basis = DirectionalBasis::klems_quarter();
            let lambda = basis.lambda();
            let layers = job
                .layers
                .iter()
                .map(|layer| directional_layer(layer, &basis, &lambda))
                .collect::<Result<Vec<_>>>()?;
            let stack = assemble(lambda, layers, job, backend)?;
            Ok(Construction::Directional { basis, stack })
        }
    }
}

/// Run a full calculation from a parsed job configuration.
pub fn run_job(job: &JobConfig) -> Result<StackOutput> {
    match build_construction(job)? {
        Construction::Scalar(stack) => evaluate(&stack, 0, job),
        Construction::Directional { basis, stack } => {
            println!("Basis: quarter Klems ({} directions)", basis.len());
            evaluate(&stack, NORMAL_DIRECTION, job)
        }
    }
}

fn create_backend(job: &JobConfig) -> Result<Arc<dyn ComputeBackend>> {
    let backend = backend_by_name(&job.stack.backend, job.stack.threads)
        .context("Cannot create compute backend")?;
    log::info!("Using backend: {}", backend.device_info().name);
    Ok(backend)
}

fn assemble<Op: Operator>(
    lambda: Op,
    layers: Vec<Arc<dyn LayerSource<Op>>>,
    job: &JobConfig,
    backend: Arc<dyn ComputeBackend>,
) -> Result<SpectralStack<Op>> {
    let mut layers = layers.into_iter();
    let first = layers.next().context("Job has no layers")?;
    let mut stack = SpectralStack::new(lambda, first).with_backend(backend);
    for layer in layers {
        stack.add_layer(layer, Side::Back);
    }
    if let Some(source) = &job.source {
        let spectrum = Spectrum::new(source.wavelengths.clone(), source.values.clone())
            .context("Invalid [source] spectrum")?;
        stack.set_source_spectrum(spectrum);
    }
    Ok(stack)
}

fn samples(layer: &LayerConfig) -> Result<Vec<SpecularSample>> {
    let n = layer.wavelengths.len();
    let rb = layer.rb.as_ref().unwrap_or(&layer.rf);
    if layer.t.len() != n || layer.rf.len() != n || rb.len() != n {
        anyhow::bail!(
            "Layer '{}': wavelengths, t, rf and rb must have the same length",
            layer.name
        );
    }
    Ok((0..n)
        .map(|i| SpecularSample {
            wavelength_nm: layer.wavelengths[i],
            t: layer.t[i],
            rf: layer.rf[i],
            rb: rb[i],
        })
        .collect())
}

fn eqe_pairs(eqe: &SpectrumConfig, name: &str) -> Result<Vec<(f64, f64)>> {
    if eqe.wavelengths.len() != eqe.values.len() {
        anyhow::bail!("Layer '{}': eqe wavelengths and values differ in length", name);
    }
    Ok(eqe.wavelengths.iter().copied().zip(eqe.values.iter().copied()).collect())
}

/// Wrap `optics` as photovoltaic when the layer has an EQE table.
fn with_eqe<Op: Operator, L: LayerSource<Op> + 'static>(
    optics: L,
    layer: &LayerConfig,
    lambda: Op,
) -> Result<Arc<dyn LayerSource<Op>>> {
    match &layer.eqe {
        None => Ok(Arc::new(optics)),
        Some(eqe) => {
            log::debug!(
                "Layer '{}': photovoltaic with {} EQE samples",
                layer.name,
                eqe.values.len()
            );
            let pv = PhotovoltaicLayer::new(optics, &eqe_pairs(eqe, &layer.name)?, lambda)
                .with_context(|| format!("Layer '{}': invalid EQE", layer.name))?;
            Ok(Arc::new(pv))
        }
    }
}

fn scalar_layer(layer: &LayerConfig) -> Result<Arc<dyn LayerSource<f64>>> {
    if layer.kind == LayerKind::Lambertian {
        anyhow::bail!(
            "Layer '{}': lambertian layers need basis = \"klems-quarter\"",
            layer.name
        );
    }
    let optics = SpecularLayer::new(&layer.name, &samples(layer)?)
        .with_context(|| format!("Layer '{}'", layer.name))?;
    with_eqe(optics, layer, 1.0)
}

fn directional_layer(
    layer: &LayerConfig,
    basis: &DirectionalBasis,
    lambda: &Array2<f64>,
) -> Result<Arc<dyn LayerSource<Array2<f64>>>> {
    let samples = samples(layer)?;
    log::debug!(
        "Layer '{}': {:?} in a {}-direction basis, {} samples",
        layer.name,
        layer.kind,
        basis.len(),
        samples.len()
    );
    let context = || format!("Layer '{}'", layer.name);
    match layer.kind {
        LayerKind::Specular => {
            let optics = SpecularLayer::new(&layer.name, &samples)
                .with_context(context)?
                .in_basis(basis);
            with_eqe(optics, layer, lambda.clone())
        }
        LayerKind::Lambertian => {
            let optics =
                BsdfLayer::lambertian(&layer.name, basis, &samples).with_context(context)?;
            with_eqe(optics, layer, lambda.clone())
        }
    }
}

fn component<V: DirectionVector>(v: &V, direction: usize) -> Result<f64> {
    v.component(direction)
        .with_context(|| format!("Direction {direction} out of range"))
}

fn components<V: DirectionVector>(series: &[V], direction: usize) -> Result<Vec<f64>> {
    series.iter().map(|v| component(v, direction)).collect()
}

fn report_progress(p: Progress) {
    let step = (p.total / 10).max(1);
    if p.completed % step == 0 || p.completed == p.total {
        println!("  [{}/{}] wavelengths", p.completed, p.total);
    }
}

fn evaluate<Op: Operator>(
    stack: &SpectralStack<Op>,
    direction: usize,
    job: &JobConfig,
) -> Result<StackOutput> {
    stack
        .calculate_with_progress(&report_progress)
        .context("Stack calculation failed")?;

    let wavelengths = stack.wavelengths()?;
    let lambda = stack.lambda();
    let hemispherical = |series: Vec<Op>| -> Result<Vec<f64>> {
        series
            .iter()
            .map(|op| component(&op.hemispherical(lambda), direction))
            .collect()
    };
    let t_front = hemispherical(stack.transmittance(Side::Front)?)?;
    let r_front = hemispherical(stack.reflectance(Side::Front)?)?;
    let t_back = hemispherical(stack.transmittance(Side::Back)?)?;
    let r_back = hemispherical(stack.reflectance(Side::Back)?)?;

    let count = stack.layer_count();
    let mut absorptance_front = Vec::with_capacity(count);
    let mut absorptance_back = Vec::with_capacity(count);
    let mut current_front = Vec::with_capacity(count);
    for index in 1..=count {
        absorptance_front.push(components(&stack.absorptance(index, Side::Front)?, direction)?);
        absorptance_back.push(components(&stack.absorptance(index, Side::Back)?, direction)?);
        current_front.push(match stack.current(index, Side::Front)? {
            Some(series) => Some(components(&series, direction)?),
            None => None,
        });
    }

    let spectra = wavelengths
        .iter()
        .enumerate()
        .map(|(w, &wavelength_nm)| SpectrumRow {
            wavelength_nm,
            t_front: t_front[w],
            r_front: r_front[w],
            t_back: t_back[w],
            r_back: r_back[w],
            absorptance_front: absorptance_front.iter().map(|a| a[w]).collect(),
            absorptance_back: absorptance_back.iter().map(|a| a[w]).collect(),
            current_front: current_front
                .iter()
                .map(|c| c.as_ref().map(|c| c[w]))
                .collect(),
        })
        .collect();

    let range: RangeInclusive<f64> = match (job.output.range, wavelengths.first(), wavelengths.last()) {
        (Some([lo, hi]), _, _) => lo..=hi,
        (None, Some(&lo), Some(&hi)) => lo..=hi,
        _ => anyhow::bail!("Calculation produced no wavelengths"),
    };
    let totals = Totals {
        range_nm: [*range.start(), *range.end()],
        t_front: stack.total_transmittance(Side::Front, direction, range.clone())?,
        r_front: stack.total_reflectance(Side::Front, direction, range.clone())?,
        t_back: stack.total_transmittance(Side::Back, direction, range.clone())?,
        r_back: stack.total_reflectance(Side::Back, direction, range.clone())?,
        absorptance_front: (1..=count)
            .map(|i| stack.total_absorptance(i, Side::Front, direction, range.clone()))
            .collect::<Result<_, _>>()?,
        absorptance_back: (1..=count)
            .map(|i| stack.total_absorptance(i, Side::Back, direction, range.clone()))
            .collect::<Result<_, _>>()?,
        current_front: (1..=count)
            .map(|i| stack.total_current(i, Side::Front, direction, range.clone()))
            .collect::<Result<_, _>>()?,
    };

    Ok(StackOutput {
        layers: stack.layer_names().into_iter().map(String::from).collect(),
        direction,
        spectra,
        totals,
    })
}

/// Print the integrated totals.
pub fn print_summary(output: &StackOutput) {
    let totals = &output.totals;
    println!(
        "Totals over {:.1}-{:.1} nm (direction {}):",
        totals.range_nm[0], totals.range_nm[1], output.direction
    );
    println!("  front: T={:.4}  R={:.4}", totals.t_front, totals.r_front);
    println!("  back:  T={:.4}  R={:.4}", totals.t_back, totals.r_back);
    for (i, name) in output.layers.iter().enumerate() {
        print!(
            "  layer {} '{}': A_front={:.4}  A_back={:.4}",
            i + 1,
            name,
            totals.absorptance_front[i],
            totals.absorptance_back[i]
        );
        match totals.current_front[i] {
            Some(j) => println!("  J_front={:.4e}", j),
            None => println!(),
        }
    }
}

/// Write per-wavelength spectra to a CSV file with a metadata header.
pub fn write_spectra_csv(output: &StackOutput, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;

    // Metadata header
    writeln!(file, "# Multilayer stack spectra")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# basis: {:?}, direction: {}", job.stack.basis, output.direction)?;
    for (i, layer) in job.layers.iter().enumerate() {
        writeln!(
            file,
            "# layer {} '{}': kind={:?}, photovoltaic={}",
            i + 1,
            layer.name,
            layer.kind,
            layer.eqe.is_some()
        )?;
    }
    writeln!(file, "#")?;

    let mut header = vec![
        "wavelength_nm".to_string(),
        "t_front".into(),
        "r_front".into(),
        "t_back".into(),
        "r_back".into(),
    ];
    let photovoltaic: Vec<usize> = (0..output.layers.len())
        .filter(|&i| output.totals.current_front[i].is_some())
        .collect();
    for i in 1..=output.layers.len() {
        header.push(format!("a_front_{i}"));
    }
    for i in 1..=output.layers.len() {
        header.push(format!("a_back_{i}"));
    }
    for &i in &photovoltaic {
        header.push(format!("j_front_{}", i + 1));
    }
    writeln!(file, "{}", header.join(","))?;

    for row in &output.spectra {
        let mut fields = vec![
            format!("{:.2}", row.wavelength_nm),
            format!("{:.6e}", row.t_front),
            format!("{:.6e}", row.r_front),
            format!("{:.6e}", row.t_back),
            format!("{:.6e}", row.r_back),
        ];
        fields.extend(row.absorptance_front.iter().map(|a| format!("{a:.6e}")));
        fields.extend(row.absorptance_back.iter().map(|a| format!("{a:.6e}")));
        fields.extend(
            photovoltaic
                .iter()
                .map(|&i| format!("{:.6e}", row.current_front[i].unwrap_or(0.0))),
        );
        writeln!(file, "{}", fields.join(","))?;
    }

    println!("Spectra written to: {}", path.display());
    Ok(())
}

/// Write spectra and totals to a JSON file.
pub fn write_spectra_json(output: &StackOutput, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(output)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Spectra (JSON) written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use approx::assert_relative_eq;

    const TWO_PANES: &str = r#"
        [stack]
        backend = "serial"

        [[layer]]
        name = "outer"
        wavelengths = [400.0, 600.0, 800.0]
        t = [0.8, 0.8, 0.8]
        rf = [0.1, 0.1, 0.1]

        [[layer]]
        name = "inner"
        wavelengths = [400.0, 800.0]
        t = [0.7, 0.7]
        rf = [0.15, 0.15]
    "#;

    #[test]
    fn test_scalar_job_matches_closed_form() {
        let job = parse_config(TWO_PANES).unwrap();
        let output = run_job(&job).unwrap();

        assert_eq!(output.layers, vec!["outer", "inner"]);
        assert_eq!(output.spectra.len(), 3);
        let expected = 0.8 * 0.7 / (1.0 - 0.1 * 0.15);
        for row in &output.spectra {
            assert_relative_eq!(row.t_front, expected, epsilon = 1e-12);
            let total = row.t_front + row.r_front + row.absorptance_front.iter().sum::<f64>();
            assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(output.totals.t_front, expected, epsilon = 1e-12);
        assert_eq!(output.totals.current_front, vec![None, None]);
    }

    #[test]
    fn test_directional_job_with_diffuser_and_cell() {
        let job = parse_config(
            r#"
            [stack]
            basis = "klems-quarter"
            threads = 2

            [[layer]]
            name = "diffuser"
            kind = "lambertian"
            wavelengths = [400.0, 800.0]
            t = [0.6, 0.6]
            rf = [0.2, 0.2]

            [[layer]]
            name = "cell"
            wavelengths = [400.0, 800.0]
            t = [0.0, 0.0]
            rf = [0.1, 0.1]
            eqe = { wavelengths = [400.0, 800.0], values = [0.9, 0.9] }
            "#,
        )
        .unwrap();
        let output = run_job(&job).unwrap();

        assert_eq!(output.direction, 0);
        let row = &output.spectra[0];
        let total = row.t_front + row.r_front + row.absorptance_front.iter().sum::<f64>();
        assert_relative_eq!(total, 1.0, epsilon = 1e-10);
        assert_eq!(row.t_front, 0.0);
        assert!(row.current_front[0].is_none());
        assert!(row.current_front[1].unwrap() > 0.0);
    }

    #[test]
    fn test_lambertian_layer_needs_directional_basis() {
        let job = parse_config(
            r#"
            [[layer]]
            name = "diffuser"
            kind = "lambertian"
            wavelengths = [400.0, 800.0]
            t = [0.6, 0.6]
            rf = [0.2, 0.2]
            "#,
        )
        .unwrap();
        let err = build_construction(&job).err().unwrap();
        assert!(err.to_string().contains("klems-quarter"));
    }

    #[test]
    fn test_unphysical_layer_is_reported_by_name() {
        let job = parse_config(
            r#"
            [[layer]]
            name = "mirror"
            wavelengths = [400.0, 800.0]
            t = [0.6, 0.6]
            rf = [0.6, 0.6]
            "#,
        )
        .unwrap();
        let err = build_construction(&job).err().unwrap();
        assert_eq!(err.to_string(), "Layer 'mirror'");
    }

    #[test]
    fn test_csv_and_json_are_written() {
        let job = parse_config(TWO_PANES).unwrap();
        let output = run_job(&job).unwrap();
        let dir = std::env::temp_dir().join(format!("multilayer-cli-test-{}", std::process::id()));

        let csv = dir.join("spectra.csv");
        write_spectra_csv(&output, &csv, &job).unwrap();
        let text = std::fs::read_to_string(&csv).unwrap();
        let lines: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(
            lines[0],
            "wavelength_nm,t_front,r_front,t_back,r_back,a_front_1,a_front_2,a_back_1,a_back_2"
        );
        assert_eq!(lines.len(), 4);

        let json = dir.join("spectra.json");
        write_spectra_json(&output, &json).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(value["spectra"].as_array().map(Vec::len), Some(3));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
