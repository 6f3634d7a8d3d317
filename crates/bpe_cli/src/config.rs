//! Settings assembly for the CLI.
//!
//! Priority, lowest to highest: defaults, settings file, `BPE_*` environment
//! variables, command line flags.

use std::path::Path;
use std::str::FromStr;

use bpe_core::types::Verbosity;
use bpe_optimiser::config::build_settings;
use bpe_optimiser::{EstimatorSettings, SearchMethod, SlopeMethod};
use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Command line overrides for the estimator settings.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Search method override
    pub search_method: Option<String>,
    /// Slope method override
    pub slope_method: Option<String>,
    /// Iteration budget override
    pub max_iters: Option<usize>,
    /// Switch on normalised parameters
    pub normalized: bool,
}

impl CliOverrides {
    /// Apply the overrides on top of `settings`.
    pub fn merge_into(&self, settings: &mut EstimatorSettings) -> Result<()> {
        if let Some(method) = &self.search_method {
            settings.search_method = SearchMethod::from_str(method)?;
        }
        if let Some(method) = &self.slope_method {
            settings.slope_method = SlopeMethod::from_str(method)?;
        }
        if let Some(max_iters) = self.max_iters {
            settings.max_iters = max_iters;
        }
        if self.normalized {
            settings.normalized = true;
        }
        Ok(())
    }
}

/// Build the effective settings for a CLI run.
pub fn build_cli_settings(
    config_file: Option<&Path>,
    overrides: &CliOverrides,
) -> Result<EstimatorSettings> {
    let mut settings = build_settings(config_file)?;
    overrides.merge_into(&mut settings)?;
    settings.validate()?;
    Ok(settings)
}

/// Default log filter for an estimator verbosity level.
pub fn default_directive(verbosity: i64) -> &'static str {
    let level = verbosity.clamp(0, i64::from(Verbosity::MAX));
    if level < i64::from(Verbosity::BANNER) {
        "warn"
    } else if level < i64::from(Verbosity::DETAIL) {
        "info"
    } else if level < i64::from(Verbosity::TRIAL) {
        "debug"
    } else {
        "trace"
    }
}

/// Log filter from `RUST_LOG`, falling back to the verbosity level.
pub fn env_filter(verbosity: i64) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}
