//! Multilayer command-line interface.
//!
//! Run stack calculations from TOML configuration files:
//! ```sh
//! multilayer run job.toml
//! multilayer run job.toml -o results/
//! multilayer validate job.toml
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multilayer")]
#[command(about = "Equivalent-layer optics of multilayer stacks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a stack calculation from a TOML configuration file.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file and its layer data without calculating.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Multilayer Stack Calculator");
            println!("===========================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_job(&job)?;
            runner::print_summary(&result);

            // Determine output directory
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            // CSV spectra (default on)
            if job.output.save_spectra {
                let csv_path = out_dir.join("spectra.csv");
                runner::write_spectra_csv(&result, &csv_path, &job)?;
            }

            // JSON spectra (optional)
            if job.output.save_json {
                let json_path = out_dir.join("spectra.json");
                runner::write_spectra_json(&result, &json_path)?;
            }

            println!("Calculation complete.");
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let construction = runner::build_construction(&job)?;
            println!(
                "Configuration is valid: {} ({} layers: {})",
                config.display(),
                construction.layer_names().len(),
                construction.layer_names().join(", ")
            );
            Ok(())
        }
    }
}
