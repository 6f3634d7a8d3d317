//! Demo command: fit an exponential decay to synthetic data.
//!
//! Data are generated from `y(t) = amplitude · exp(-rate · t) + offset` with
//! seeded Gaussian noise, then the three parameters are estimated from a
//! deliberately poor starting guess.
//!
//! # Expected Log Output
//!
//! ```text
//! ******************************
//! Running initial simulation.
//! ******************************
//! Running iteration 1.
//! Declare convergence because cosmax of ... <= tol_cosmax_grad of 0.0001
//! ******************************
//! Running final simulation.
//! Analyzing final results.
//! ```

use std::path::Path;

use bpe_core::traits::ClosureModel;
use bpe_core::types::{OptiParam, Verbosity};
use bpe_optimiser::{run_bpe, BpeResults, EstimatorSettings, OptiOpts};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::{CliError, Result};

/// Parameters the data are generated from: amplitude, rate, offset.
pub const TRUE_PARAMS: [f64; 3] = [5.0, 0.7, 0.5];

/// Starting guess handed to the estimator.
pub const INITIAL_GUESS: [f64; 3] = [3.0, 0.3, 0.0];

const PARAM_NAMES: [&str; 3] = ["amplitude", "rate", "offset"];

/// Model arguments of the decay model.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayArgs {
    /// Initial value above the offset
    pub amplitude: f64,
    /// Decay rate
    pub rate: f64,
    /// Asymptote
    pub offset: f64,
    /// Sample times
    pub times: Vec<f64>,
}

impl DecayArgs {
    fn value(&self, name: &str) -> f64 {
        match name {
            "amplitude" => self.amplitude,
            "rate" => self.rate,
            "offset" => self.offset,
            _ => f64::NAN,
        }
    }

    fn set_value(&mut self, name: &str, value: f64) {
        match name {
            "amplitude" => self.amplitude = value,
            "rate" => self.rate = value,
            "offset" => self.offset = value,
            _ => {}
        }
    }

    fn simulate(&self) -> Vec<f64> {
        self.times
            .iter()
            .map(|t| self.amplitude * (-self.rate * t).exp() + self.offset)
            .collect()
    }
}

/// Recipe for the synthetic measurements.
#[derive(Debug, Clone)]
pub struct SyntheticData {
    seed: u64,
    noise: f64,
    times: Vec<f64>,
}

impl SyntheticData {
    /// 40 samples over `t ∈ [0, 7.8]`.
    pub fn new(seed: u64, noise: f64) -> Self {
        Self {
            seed,
            noise,
            times: (0..40).map(|i| i as f64 * 0.2).collect(),
        }
    }

    /// Sample times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Noisy measurements of the true model.
    pub fn measurements(&self) -> Result<Vec<f64>> {
        if self.noise.is_nan() || self.noise < 0.0 {
            return Err(CliError::InvalidArgument(format!(
                "noise must be non-negative, got {}",
                self.noise
            )));
        }
        let normal = Normal::new(0.0, self.noise).map_err(|e| {
            CliError::InvalidArgument(format!("noise of {}: {}", self.noise, e))
        })?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let truth = DecayArgs {
            amplitude: TRUE_PARAMS[0],
            rate: TRUE_PARAMS[1],
            offset: TRUE_PARAMS[2],
            times: self.times.clone(),
        };
        Ok(truth
            .simulate()
            .into_iter()
            .map(|y| y + normal.sample(&mut rng))
            .collect())
    }
}

type DecayModel = ClosureModel<DecayArgs, Vec<f64>, Vec<f64>>;

fn decay_model() -> Result<DecayModel> {
    let model = ClosureModel::builder()
        .model(|args: &DecayArgs| args.simulate())
        .cost(|sim: &Vec<f64>, data: &Vec<f64>| {
            DVector::from_iterator(sim.len(), sim.iter().zip(data).map(|(s, d)| s - d))
        })
        .getter(|names: &[String], args: &DecayArgs| {
            DVector::from_iterator(names.len(), names.iter().map(|n| args.value(n)))
        })
        .setter(|names: &[String], values: &DVector<f64>, args: &mut DecayArgs| {
            for (name, value) in names.iter().zip(values.iter()) {
                args.set_value(name, *value);
            }
        })
        .build()?;
    Ok(model)
}

/// Assemble the estimation options for the demo.
pub fn demo_opts(
    settings: EstimatorSettings,
    verbosity: Verbosity,
    output: Option<&Path>,
    data: &SyntheticData,
) -> Result<OptiOpts<DecayModel>> {
    let params = PARAM_NAMES
        .iter()
        .zip(INITIAL_GUESS.iter().zip(TRUE_PARAMS.iter()))
        .map(|(name, (guess, truth))| {
            OptiParam::new(*name)
                .with_best(*guess)
                .with_typical(truth.abs().max(0.1))
        })
        .collect();

    let mut builder = OptiOpts::builder(decay_model()?)
        .model_args(DecayArgs {
            amplitude: INITIAL_GUESS[0],
            rate: INITIAL_GUESS[1],
            offset: INITIAL_GUESS[2],
            times: data.times().to_vec(),
        })
        .cost_args(data.measurements()?)
        .params(params)
        .settings(settings)
        .verbosity(verbosity);
    if let Some(path) = output {
        builder = builder.output_loc(path);
    }
    Ok(builder.build()?)
}

/// Run the demo command
pub fn run(
    settings: EstimatorSettings,
    verbosity: i64,
    output: Option<&Path>,
    data: &SyntheticData,
) -> Result<BpeResults> {
    let verbosity = Verbosity::new(verbosity)?;
    info!("Starting exponential-decay demo...");
    info!("  Search method: {}", settings.search_method);
    info!("  Slope method: {}", settings.slope_method);

    let opts = demo_opts(settings, verbosity, output, data)?;
    let run = run_bpe(&opts)?;
    let results = run.results;

    println!("========================================");
    println!("Exponential Decay Fit");
    println!("========================================");
    println!(
        "{:<12}{:>12}{:>12}{:>12}{:>12}",
        "parameter", "initial", "fitted", "true", "1-sigma"
    );
    let fitted = results.final_params.clone().unwrap_or_else(|| DVector::zeros(3));
    let sigmas = results
        .one_sigmas()
        .unwrap_or_else(|| DVector::from_element(3, f64::NAN));
    for (i, name) in PARAM_NAMES.iter().enumerate() {
        println!(
            "{:<12}{:>12.5}{:>12.5}{:>12.5}{:>12.5}",
            name, INITIAL_GUESS[i], fitted[i], TRUE_PARAMS[i], sigmas[i]
        );
    }
    println!();
    println!(
        "Iterations: {}  Evaluations: {}",
        results.num_iters, results.num_evals
    );
    if let Some(path) = output {
        info!("Results written to: {}", path.display());
    }

    Ok(results)
}
