//! BPE CLI - Command Line Front End for the Batch Parameter Estimator
//!
//! # Commands
//!
//! - `bpe demo` - Fit an exponential-decay model to seeded synthetic data
//! - `bpe show <file>` - Print a saved result file
//! - `bpe check` - Validate estimator settings
//!
//! # Architecture
//!
//! As part of the **S**ervice layer, this crate wires `bpe_core` and
//! `bpe_optimiser` into a command line tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;

pub use error::{CliError, Result};

/// Batch Parameter Estimator CLI
#[derive(Parser)]
#[command(name = "bpe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Estimator verbosity, 0 (silent) to 10 (every trial step)
    #[arg(short, long, global = true, default_value_t = 5)]
    verbosity: i64,

    /// Estimator settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit an exponential-decay model to seeded synthetic data
    Demo {
        /// Save results here (.json for JSON, anything else TOML)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Search method (trust_region, levenberg_marquardt)
        #[arg(short, long)]
        search_method: Option<String>,

        /// Slope method (one_sided, two_sided)
        #[arg(long)]
        slope_method: Option<String>,

        /// Outer iteration budget
        #[arg(short, long)]
        max_iters: Option<usize>,

        /// Work in parameters normalised by their typical values
        #[arg(short, long)]
        normalized: bool,

        /// Random seed for the synthetic noise
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Standard deviation of the synthetic noise
        #[arg(long, default_value_t = 0.05)]
        noise: f64,
    },

    /// Print a saved result file
    Show {
        /// Result file written by a previous run
        path: PathBuf,
    },

    /// Validate estimator settings and print the effective values
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config::env_filter(cli.verbosity))
        .init();

    debug!("Verbosity {}", cli.verbosity);

    match cli.command {
        Commands::Demo {
            output,
            search_method,
            slope_method,
            max_iters,
            normalized,
            seed,
            noise,
        } => {
            let overrides = config::CliOverrides {
                search_method,
                slope_method,
                max_iters,
                normalized,
            };
            let settings = config::build_cli_settings(cli.config.as_deref(), &overrides)?;
            commands::demo::run(
                settings,
                cli.verbosity,
                output.as_deref(),
                &commands::demo::SyntheticData::new(seed, noise),
            )?;
        }
        Commands::Show { path } => commands::show::run(&path)?,
        Commands::Check => commands::check::run(cli.config.as_deref())?,
    }
    Ok(())
}
