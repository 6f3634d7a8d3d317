//! Outer iteration driver.
//!
//! [`run_bpe`] evaluates the model at its starting parameters, then per
//! outer iteration:
//!
//! 1. applies the step accepted by the previous search
//! 2. estimates the Jacobian, gradient and Hessian
//! 3. grows the trust radius additively when the new gradient and the
//!    previous step have a positive dot product
//! 4. computes the Gauss-Newton step and its predicted cost change
//! 5. stops if converged, otherwise runs the trust-region search
//!
//! It finishes with a final evaluation, the post-fit analysis and, when an
//! output location is configured, persistence of the results.

use std::mem;

use bpe_core::math::linalg::lstsq;
use bpe_core::math::solvers::{levenberg_marquardt_step, predict_func_change};
use bpe_core::traits::EstimationModel;
use bpe_core::types::{SolverError, Verbosity};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, trace, warn};

use crate::analysis::analyze_run;
use crate::config::{validate_params, OptiOpts};
use crate::convergence::{check_for_convergence, compute_cosmax};
use crate::error::BpeError;
use crate::evaluation::evaluate;
use crate::jacobian::{finite_differences, ParamScaling};
use crate::results::{BpeResults, ResultsFormat, StepInfo};
use crate::search::{cost_of, dogleg_search, SearchStart};

const DIVIDER: &str = "******************************";

/// Output of a completed estimation run.
#[derive(Debug, Clone)]
pub struct BpeRun<O> {
    /// Diagnostics, history and uncertainty analysis.
    pub results: BpeResults,
    /// Model output at the final parameters.
    pub output: O,
}

/// Re-check options before a run.
pub fn validate_opti_opts<M: EstimationModel>(opts: &OptiOpts<M>) -> Result<(), BpeError> {
    validate_params(opts.params(), opts.settings().normalized)?;
    opts.settings().validate()?;
    Ok(())
}

fn banner(verbosity: Verbosity, message: &str) {
    if verbosity.allows(Verbosity::BANNER) {
        info!("{}", DIVIDER);
        info!("{}", message);
    }
}

/// Run the batch parameter estimator.
///
/// The caller's options are never mutated: the model arguments are cloned
/// once into a working copy that the setter writes into.
///
/// # Errors
///
/// - [`BpeError::Config`] if the options fail validation
/// - [`BpeError::Solver`] if the getter returns the wrong number of values
///   or a step cannot be solved
/// - [`BpeError::Io`] / [`BpeError::Serialization`] if saving fails
pub fn run_bpe<M: EstimationModel>(opts: &OptiOpts<M>) -> Result<BpeRun<M::Output>, BpeError> {
    validate_opti_opts(opts)?;

    let settings = opts.settings();
    let verbosity = opts.verbosity();
    let model = opts.model();
    let names = opts.param_names();
    let two_sided = settings.slope_method.is_two_sided();
    let scaling = ParamScaling::new(opts.params(), settings.normalized);

    if settings.is_max_like {
        warn!("Maximum-likelihood log-determinant terms are not computed; using zero.");
    }

    let mut results = BpeResults::new();
    let mut model_args = opts.model_args().clone();

    banner(verbosity, "Running initial simulation.");
    let (_, begin_innovs) = evaluate(opts, &mut results, Some(&model_args), None);
    let mut innovs = begin_innovs.clone();
    results.begin_innovs = Some(begin_innovs);

    let mut best_cost = cost_of(&innovs, settings.is_max_like);
    let initial_values = model.get_params(names, &model_args);
    if initial_values.len() != names.len() {
        return Err(SolverError::dimension_mismatch(
            "parameter getter",
            names.len(),
            initial_values.len(),
        )
        .into());
    }
    let mut params = scaling.to_working(&initial_values);

    let mut costs = vec![best_cost];
    let mut param_history = vec![initial_values.clone()];
    let mut step_history = Vec::new();

    if verbosity.allows(Verbosity::DETAIL) {
        debug!(" Initial parameters: {:?}", initial_values.as_slice());
        debug!(" Initial cost: {}", best_cost);
    }

    let num_params = params.len();
    let mut pending = DVector::zeros(num_params);
    let mut trust_radius = settings.trust_radius;
    let mut converged = false;
    let mut last_jacobian: Option<DMatrix<f64>> = None;

    for iteration in 1..=settings.max_iters {
        results.num_iters = iteration;
        banner(verbosity, &format!("Running iteration {}.", iteration));

        let last_step = mem::replace(&mut pending, DVector::zeros(num_params));
        params += &last_step;

        let estimate = finite_differences(
            opts,
            &mut model_args,
            &mut results,
            &scaling,
            &params,
            &innovs,
            two_sided,
        );

        if iteration > 1 && estimate.gradient.dot(&last_step) > 0.0 {
            trust_radius += settings.grow_radius;
            if verbosity.allows(Verbosity::TRIAL) {
                trace!(
                    trust_radius,
                    "Old step still in descent direction, so expand current trust_radius to {}.",
                    trust_radius
                );
            }
        }

        let cosmax = compute_cosmax(&estimate.jacobian, &innovs);

        let newton_delta = if settings.is_max_like {
            -lstsq(&estimate.hessian, &estimate.gradient)?
        } else {
            levenberg_marquardt_step(&estimate.jacobian, &innovs, 0.0)?
        };
        let delta_step_len = newton_delta.norm();
        let pred_func_change =
            predict_func_change(&newton_delta, &estimate.gradient, &estimate.hessian)?;

        let check =
            check_for_convergence(settings, verbosity, cosmax, delta_step_len, pred_func_change);
        if check.is_converged() {
            converged = true;
            last_jacobian = Some(estimate.jacobian);
            break;
        }

        let outcome = dogleg_search(
            opts,
            &mut model_args,
            &mut results,
            &scaling,
            SearchStart {
                params: &params,
                cost: best_cost,
                estimate: &estimate,
                innovs: &innovs,
                newton_delta: &newton_delta,
                trust_radius,
            },
        )?;
        trust_radius = outcome.trust_radius;

        if outcome.improved {
            pending = &outcome.params - &params;
            innovs = outcome.innovs;
            best_cost = outcome.cost;
        }

        param_history.push(scaling.to_model(&(&params + &pending)));
        costs.push(best_cost);
        step_history.push(StepInfo {
            iteration,
            trust_radius,
            step_type: outcome.step_type,
            step_len: outcome.step_len,
            step_scale: outcome.step_scale,
            pred_func_change: outcome.pred_func_change,
            num_shrinks: outcome.num_shrinks,
            improved: outcome.improved,
        });
        last_jacobian = Some(estimate.jacobian);
    }

    if !converged && verbosity.allows(Verbosity::DETAIL) {
        warn!(
            "Stopped iterating due to hitting the max number of iterations: {}.",
            settings.max_iters
        );
    }

    params += &pending;
    let final_params = scaling.to_model(&params);

    banner(verbosity, "Running final simulation.");
    model.set_params(names, &final_params, &mut model_args);
    let (output, final_innovs) = evaluate(opts, &mut results, Some(&model_args), None);
    let final_cost = cost_of(&final_innovs, settings.is_max_like);

    if verbosity.allows(Verbosity::SUMMARY) {
        info!(" Final parameters: {:?}", final_params.as_slice());
        info!(" Final cost: {}", final_cost);
    }

    results.final_innovs = Some(final_innovs);
    results.final_params = Some(final_params);
    results.params = Some(param_history);
    results.costs = Some(costs);
    results.step_info = Some(step_history);

    if let Some(jacobian) = last_jacobian {
        let analysis = analyze_run(
            &scaling.model_jacobian(&jacobian),
            scaling.typical(),
            settings.normalized,
            verbosity,
            results.num_evals,
        );
        results.covariance = Some(analysis.covariance);
        results.correlation = Some(analysis.correlation);
        results.info_svd = Some(analysis.info_svd);
    }

    if let Some(path) = opts.output_loc() {
        results.save_logged(path, ResultsFormat::from_path(path), verbosity)?;
    }

    Ok(BpeRun { results, output })
}
