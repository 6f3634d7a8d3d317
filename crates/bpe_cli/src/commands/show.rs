//! Show command implementation
//!
//! Prints a result file written by a previous estimation run.

use std::fmt::Write as _;
use std::path::Path;

use bpe_optimiser::{BpeResults, ResultsFormat};
use tracing::info;

use crate::{CliError, Result};

/// Run the show command
pub fn run(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    let format = ResultsFormat::from_path(path);
    info!("Loading {} results from: {}", format, path.display());

    let results = BpeResults::load(path, format)?;
    print!("{}", render(&results));
    Ok(())
}

/// Text summary of a result set.
pub fn render(results: &BpeResults) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "========================================");
    let _ = writeln!(out, "BPE Results");
    let _ = writeln!(out, "========================================");
    let _ = writeln!(out, "Iterations:  {}", results.num_iters);
    let _ = writeln!(out, "Evaluations: {}", results.num_evals);

    if let Some(costs) = &results.costs {
        if let (Some(first), Some(last)) = (costs.first(), costs.last()) {
            let _ = writeln!(out, "Cost:        {:.6e} -> {:.6e}", first, last);
        }
    }

    if let Some(params) = &results.final_params {
        let sigmas = results.one_sigmas();
        let _ = writeln!(out);
        let _ = writeln!(out, "{:<8}{:>16}{:>16}", "index", "value", "1-sigma");
        for (i, value) in params.iter().enumerate() {
            let sigma = sigmas
                .as_ref()
                .and_then(|s| s.get(i).copied())
                .unwrap_or(f64::NAN);
            let _ = writeln!(out, "{:<8}{:>16.8}{:>16.8}", i, value, sigma);
        }
    }

    if let Some(correlation) = &results.correlation {
        let _ = writeln!(out);
        let _ = writeln!(out, "Correlation:");
        for row in correlation.row_iter() {
            let line: Vec<String> = row.iter().map(|x| format!("{:>8.4}", x)).collect();
            let _ = writeln!(out, "{}", line.join(""));
        }
    }

    if let Some(steps) = &results.step_info {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:<6}{:>20}{:>14}{:>14}{:>9}",
            "iter", "step", "length", "trust", "shrinks"
        );
        for step in steps {
            let _ = writeln!(
                out,
                "{:<6}{:>20}{:>14.4e}{:>14.4e}{:>9}",
                step.iteration,
                step.step_type.label(),
                step.step_len,
                step.trust_radius,
                step.num_shrinks
            );
        }
    }
    out
}
