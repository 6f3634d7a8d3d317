//! Check command implementation
//!
//! Validates estimator settings from a file and the environment, then prints
//! the effective values.

use std::path::Path;

use bpe_optimiser::config::{build_settings, ENV_VARS};
use bpe_optimiser::EstimatorSettings;
use tracing::info;

use crate::{CliError, Result};

/// Run the check command
pub fn run(config_file: Option<&Path>) -> Result<()> {
    if let Some(path) = config_file {
        if !path.exists() {
            return Err(CliError::FileNotFound(path.display().to_string()));
        }
        info!("Checking settings file: {}", path.display());
    } else {
        info!("No settings file given, checking defaults and environment");
    }

    for var in ENV_VARS {
        if std::env::var(var).is_ok() {
            info!("  {} is set", var);
        }
    }

    let settings = build_settings(config_file)?;
    print!("{}", describe(&settings));
    info!("Settings are valid");
    Ok(())
}

/// One line per setting.
pub fn describe(settings: &EstimatorSettings) -> String {
    [
        format!("slope_method    = {}", settings.slope_method),
        format!("search_method   = {}", settings.search_method),
        format!("is_max_like     = {}", settings.is_max_like),
        format!("max_iters       = {}", settings.max_iters),
        format!("step_limit      = {}", settings.step_limit),
        format!("tol_cosmax_grad = {:e}", settings.tol_cosmax_grad),
        format!("tol_delta_step  = {:e}", settings.tol_delta_step),
        format!("tol_delta_cost  = {:e}", settings.tol_delta_cost),
        format!("x_bias          = {}", settings.x_bias),
        format!("grow_radius     = {}", settings.grow_radius),
        format!("shrink_radius   = {}", settings.shrink_radius),
        format!("trust_radius    = {}", settings.trust_radius),
        format!("normalized      = {}", settings.normalized),
    ]
    .iter()
    .fold(String::new(), |acc, line| acc + line + "\n")
}
