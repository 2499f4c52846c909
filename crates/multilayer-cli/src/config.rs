//! TOML configuration deserialisation for stack jobs.

use serde::Deserialize;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub stack: StackConfig,
    /// Layers front to back.
    #[serde(rename = "layer")]
    pub layers: Vec<LayerConfig>,
    pub source: Option<SpectrumConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Stack-wide settings.
#[derive(Debug, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub basis: BasisKind,
    /// Compute backend: "cpu" or "serial". Default: "cpu".
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Worker threads for the CPU backend (default: all cores).
    pub threads: Option<usize>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            basis: BasisKind::default(),
            backend: default_backend(),
            threads: None,
        }
    }
}

fn default_backend() -> String {
    "cpu".into()
}

/// Directional resolution of the calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BasisKind {
    /// Hemispherical values only.
    #[default]
    Scalar,
    /// The 41-direction quarter Klems basis.
    KlemsQuarter,
}

/// How a layer redistributes light over directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerKind {
    #[default]
    Specular,
    /// Perfect diffuser; needs a directional basis.
    Lambertian,
}

/// A single layer of the stack.
#[derive(Debug, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    #[serde(default)]
    pub kind: LayerKind,
    /// Sample wavelengths in nm.
    pub wavelengths: Vec<f64>,
    /// Transmittance at each wavelength.
    pub t: Vec<f64>,
    /// Front reflectance at each wavelength.
    pub rf: Vec<f64>,
    /// Back reflectance (default: same as `rf`).
    pub rb: Option<Vec<f64>>,
    /// External quantum efficiency; makes the layer photovoltaic.
    pub eqe: Option<SpectrumConfig>,
}

/// A tabulated spectrum (source irradiance or EQE).
#[derive(Debug, Deserialize)]
pub struct SpectrumConfig {
    pub wavelengths: Vec<f64>,
    pub values: Vec<f64>,
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to save spectra as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_spectra: bool,
    /// Whether to also save spectra as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
    /// Integration range in nm for the printed totals (default: whole grid).
    pub range: Option<[f64; 2]>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_spectra: true,
            save_json: false,
            range: None,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    if config.layers.is_empty() {
        anyhow::bail!("Job has no [[layer]] tables");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_job_uses_defaults() {
        let job = parse_config(
            r#"
            [[layer]]
            name = "clear"
            wavelengths = [300.0, 2500.0]
            t = [0.8, 0.8]
            rf = [0.08, 0.08]
            "#,
        )
        .unwrap();
        assert_eq!(job.stack.basis, BasisKind::Scalar);
        assert_eq!(job.stack.backend, "cpu");
        assert_eq!(job.layers[0].kind, LayerKind::Specular);
        assert!(job.layers[0].rb.is_none());
        assert!(job.output.save_spectra);
        assert_eq!(job.output.directory, "./output");
    }

    #[test]
    fn test_full_job() {
        let job = parse_config(
            r#"
            [stack]
            basis = "klems-quarter"
            threads = 2

            [[layer]]
            name = "diffuser"
            kind = "lambertian"
            wavelengths = [400.0, 800.0]
            t = [0.5, 0.5]
            rf = [0.2, 0.2]
            rb = [0.25, 0.25]

            [[layer]]
            name = "cell"
            wavelengths = [400.0, 800.0]
            t = [0.0, 0.0]
            rf = [0.1, 0.1]
            eqe = { wavelengths = [400.0, 800.0], values = [0.9, 0.8] }

            [source]
            wavelengths = [400.0, 800.0]
            values = [1.2, 1.0]

            [output]
            save_json = true
            range = [400.0, 700.0]
            "#,
        )
        .unwrap();
        assert_eq!(job.stack.basis, BasisKind::KlemsQuarter);
        assert_eq!(job.stack.threads, Some(2));
        assert_eq!(job.layers.len(), 2);
        assert_eq!(job.layers[0].kind, LayerKind::Lambertian);
        assert_eq!(job.layers[1].eqe.as_ref().map(|e| e.values.len()), Some(2));
        assert_eq!(job.output.range, Some([400.0, 700.0]));
    }

    #[test]
    fn test_job_without_layers_is_rejected() {
        assert!(parse_config("[stack]\nbasis = \"scalar\"\n").is_err());
    }
}
