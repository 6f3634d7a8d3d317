//! Integration tests for the batch parameter estimator.
//!
//! These tests drive `run_bpe` end to end through closure-built models,
//! covering both search methods, both slope methods, normalised parameters,
//! the maximum-likelihood switch and result persistence.

use approx::assert_relative_eq;
use bpe_core::traits::ClosureModel;
use bpe_core::types::{OptiParam, Verbosity};
use bpe_optimiser::{
    run_bpe, BpeResults, EstimatorSettings, OptiOpts, ResultsFormat, SearchMethod, SlopeMethod,
};
use nalgebra::DVector;

// ============================================================================
// Models
// ============================================================================

type ScalarModel = ClosureModel<f64, Vec<f64>, f64>;

/// Innovations `w_i (x - 3)`: a quadratic cost with its minimum at `x = 3`
/// and curvature `Σ w_i²`.
fn quadratic_model() -> ScalarModel {
    ClosureModel::builder()
        .model(|x: &f64| *x)
        .cost(|x: &f64, weights: &Vec<f64>| {
            DVector::from_iterator(weights.len(), weights.iter().map(|w| w * (x - 3.0)))
        })
        .getter(|_: &[String], x: &f64| DVector::from_element(1, *x))
        .setter(|_: &[String], v: &DVector<f64>, x: &mut f64| *x = v[0])
        .build()
        .unwrap()
}

const WEIGHTS: [f64; 3] = [1.0, 2.0, 3.0];

fn quadratic_opts(settings: EstimatorSettings) -> OptiOpts<ScalarModel> {
    OptiOpts::builder(quadratic_model())
        .model_args(-2.0)
        .cost_args(WEIGHTS.to_vec())
        .param(OptiParam::new("x").with_typical(1.0))
        .settings(settings)
        .verbosity(Verbosity::SILENT)
        .build()
        .unwrap()
}

#[derive(Debug, Clone, PartialEq)]
struct DecayArgs {
    amplitude: f64,
    rate: f64,
    times: Vec<f64>,
}

type DecayModel = ClosureModel<DecayArgs, Vec<f64>, Vec<f64>>;

/// `y(t) = amplitude · exp(-rate · t)`, fitted against noiseless samples.
fn decay_model() -> DecayModel {
    ClosureModel::builder()
        .model(|a: &DecayArgs| {
            a.times
                .iter()
                .map(|t| a.amplitude * (-a.rate * t).exp())
                .collect()
        })
        .cost(|sim: &Vec<f64>, data: &Vec<f64>| {
            DVector::from_iterator(sim.len(), sim.iter().zip(data).map(|(s, d)| s - d))
        })
        .getter(|names: &[String], a: &DecayArgs| {
            DVector::from_iterator(
                names.len(),
                names.iter().map(|n| match n.as_str() {
                    "amplitude" => a.amplitude,
                    _ => a.rate,
                }),
            )
        })
        .setter(|names: &[String], v: &DVector<f64>, a: &mut DecayArgs| {
            for (name, value) in names.iter().zip(v.iter()) {
                match name.as_str() {
                    "amplitude" => a.amplitude = *value,
                    _ => a.rate = *value,
                }
            }
        })
        .build()
        .unwrap()
}

fn decay_opts(settings: EstimatorSettings) -> OptiOpts<DecayModel> {
    let times: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
    let data = times.iter().map(|t| 5.0 * (-0.7 * t).exp()).collect();
    OptiOpts::builder(decay_model())
        .model_args(DecayArgs {
            amplitude: 3.0,
            rate: 0.3,
            times,
        })
        .cost_args(data)
        .param(OptiParam::new("amplitude").with_typical(5.0))
        .param(OptiParam::new("rate").with_typical(0.5))
        .settings(settings)
        .verbosity(Verbosity::SILENT)
        .build()
        .unwrap()
}

// ============================================================================
// End-to-End Estimation Tests
// ============================================================================

/// Test the quadratic fit converges and reports the analytic covariance.
#[test]
fn test_quadratic_converges_with_analytic_covariance() {
    let settings = EstimatorSettings {
        search_method: SearchMethod::TrustRegion,
        max_iters: 5,
        tol_delta_cost: 1e-20,
        ..Default::default()
    };
    let run = run_bpe(&quadratic_opts(settings)).unwrap();
    let results = &run.results;

    let fitted = results.final_params.as_ref().unwrap();
    assert_relative_eq!(fitted[0], 3.0, epsilon = 1e-6);
    assert_relative_eq!(run.output, 3.0, epsilon = 1e-6);

    let curvature: f64 = WEIGHTS.iter().map(|w| w * w).sum();
    let covariance = results.covariance.as_ref().unwrap();
    assert_relative_eq!(covariance[(0, 0)], 1.0 / curvature, max_relative = 1e-6);
    assert_relative_eq!(results.correlation.as_ref().unwrap()[(0, 0)], 1.0, epsilon = 1e-12);

    let final_innovs = results.final_innovs.as_ref().unwrap();
    assert!(final_innovs.norm() < 1e-5);
    assert!(results.num_iters <= 5);
}

/// Test the Levenberg-Marquardt search reaches the same minimum.
#[test]
fn test_levenberg_marquardt_search() {
    let settings = EstimatorSettings::default()
        .with_search_method(SearchMethod::LevenbergMarquardt)
        .with_max_iters(25);
    let run = run_bpe(&quadratic_opts(settings)).unwrap();
    let fitted = run.results.final_params.unwrap();
    assert_relative_eq!(fitted[0], 3.0, epsilon = 1e-5);
}

/// Test a nonlinear two-parameter fit with two-sided slopes.
#[test]
fn test_exponential_decay_two_sided() {
    let settings = EstimatorSettings::default()
        .with_slope_method(SlopeMethod::TwoSided)
        .with_max_iters(30);
    let run = run_bpe(&decay_opts(settings)).unwrap();
    let fitted = run.results.final_params.as_ref().unwrap();
    assert_relative_eq!(fitted[0], 5.0, epsilon = 1e-4);
    assert_relative_eq!(fitted[1], 0.7, epsilon = 1e-4);

    let correlation = run.results.correlation.as_ref().unwrap();
    assert_relative_eq!(correlation[(0, 1)], correlation[(1, 0)], epsilon = 1e-12);
    assert!(correlation[(0, 1)].abs() <= 1.0 + 1e-12);
}

/// Test normalised working coordinates give the same answer in model units.
#[test]
fn test_exponential_decay_normalized() {
    let settings = EstimatorSettings::default()
        .with_normalized(true)
        .with_max_iters(30);
    let run = run_bpe(&decay_opts(settings)).unwrap();
    let fitted = run.results.final_params.as_ref().unwrap();
    assert_relative_eq!(fitted[0], 5.0, epsilon = 1e-4);
    assert_relative_eq!(fitted[1], 0.7, epsilon = 1e-4);

    // History is reported in model units.
    let history = run.results.params.as_ref().unwrap();
    assert_relative_eq!(history[0][0], 3.0, epsilon = 1e-12);
    assert_relative_eq!(history[0][1], 0.3, epsilon = 1e-12);
}

/// Test maximum-likelihood mode runs with the zero correction.
#[test]
fn test_max_like_mode() {
    let settings = EstimatorSettings {
        is_max_like: true,
        max_iters: 10,
        ..Default::default()
    };
    let run = run_bpe(&quadratic_opts(settings)).unwrap();
    let fitted = run.results.final_params.unwrap();
    assert_relative_eq!(fitted[0], 3.0, epsilon = 1e-6);
}

// ============================================================================
// Run Invariant Tests
// ============================================================================

/// Test the caller's model arguments survive a run unchanged.
#[test]
fn test_caller_model_args_untouched() {
    let opts = decay_opts(EstimatorSettings::default());
    let before = opts.model_args().clone();
    run_bpe(&opts).unwrap();
    assert_eq!(opts.model_args(), &before);
}

/// Test the recorded best cost never increases across iterations.
#[test]
fn test_costs_monotonic() {
    let run = run_bpe(&decay_opts(EstimatorSettings::default().with_max_iters(15))).unwrap();
    let costs = run.results.costs.unwrap();
    assert!(costs.len() >= 2);
    for pair in costs.windows(2) {
        assert!(pair[1] <= pair[0], "cost rose from {} to {}", pair[0], pair[1]);
    }
}

/// Test the step log lines up with the iteration count.
#[test]
fn test_step_info_recorded() {
    let run = run_bpe(&decay_opts(EstimatorSettings::default().with_max_iters(3))).unwrap();
    let steps = run.results.step_info.unwrap();
    assert!(!steps.is_empty());
    for (i, step) in steps.iter().enumerate() {
        assert_eq!(step.iteration, i + 1);
        assert!(step.trust_radius > 0.0);
    }
}

// ============================================================================
// Persistence Tests
// ============================================================================

/// Test a run saves to its output location and reloads identically.
#[test]
fn test_run_persists_results() {
    let dir = tempfile::tempdir().unwrap();
    for file in ["out/results.json", "out/results.toml"] {
        let path = dir.path().join(file);
        let opts = quadratic_opts(EstimatorSettings::default())
            .into_builder()
            .output_loc(&path)
            .build()
            .unwrap();
        let run = run_bpe(&opts).unwrap();

        let loaded = BpeResults::load(&path, ResultsFormat::from_path(&path)).unwrap();
        assert_eq!(loaded, run.results);
    }
}

/// Test an empty output location disables saving.
#[test]
fn test_empty_output_loc_skips_save() {
    let opts = quadratic_opts(EstimatorSettings::default())
        .into_builder()
        .output_loc("")
        .build()
        .unwrap();
    assert!(opts.output_loc().is_none());
    run_bpe(&opts).unwrap();
}
