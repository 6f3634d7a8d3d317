//! Trust-region search controller.
//!
//! Given the local linearisation at the current parameters, repeatedly
//! proposes a step, evaluates the model there and grows or shrinks the trust
//! radius until one of:
//! - a full Newton step improves the cost
//! - an improvement follows an earlier shrink
//! - an expansion fails after an earlier improvement (revert to the best point)
//! - the step-cut budget runs out
//!
//! The proposal comes from the double dogleg in trust-region mode, or from a
//! Levenberg-Marquardt step with damping `1 / trust_radius`.

use bpe_core::math::linalg::sum_of_squares;
use bpe_core::math::solvers::{
    double_dogleg, levenberg_marquardt_step, predict_func_change, DoglegStep, StepType,
};
use bpe_core::traits::EstimationModel;
use bpe_core::types::Verbosity;
use nalgebra::DVector;
use tracing::{info, trace, warn};

use crate::config::{OptiOpts, SearchMethod};
use crate::error::BpeError;
use crate::evaluation::evaluate;
use crate::jacobian::{JacobianEstimate, ParamScaling};
use crate::results::BpeResults;

/// Local state the search starts from.
#[derive(Debug, Clone, Copy)]
pub struct SearchStart<'a> {
    /// Current parameters, working coordinates.
    pub params: &'a DVector<f64>,
    /// Cost at `params`.
    pub cost: f64,
    /// Jacobian, gradient and Hessian at `params`.
    pub estimate: &'a JacobianEstimate,
    /// Innovations at `params`.
    pub innovs: &'a DVector<f64>,
    /// Gauss-Newton step from `params`.
    pub newton_delta: &'a DVector<f64>,
    /// Trust radius on entry.
    pub trust_radius: f64,
}

/// Result of one search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    /// Trust radius on exit.
    pub trust_radius: f64,
    /// Whether any trial lowered the cost.
    pub improved: bool,
    /// Best parameters found, working coordinates. The start when not improved.
    pub params: DVector<f64>,
    /// Innovations at `params`.
    pub innovs: DVector<f64>,
    /// Cost at `params`.
    pub cost: f64,
    /// Step cuts taken.
    pub num_shrinks: usize,
    /// Type of the last trial step.
    pub step_type: StepType,
    /// Length of the last trial step.
    pub step_len: f64,
    /// Scale of the last trial step.
    pub step_scale: f64,
    /// Predicted cost change of the last trial step.
    pub pred_func_change: f64,
}

struct Accepted {
    params: DVector<f64>,
    innovs: DVector<f64>,
    cost: f64,
}

/// Cost of a set of innovations.
///
/// Half the sum of squares. In maximum-likelihood mode the log-determinant
/// term is not modelled and contributes zero.
#[inline]
pub fn cost_of(innovs: &DVector<f64>, _is_max_like: bool) -> f64 {
    0.5 * sum_of_squares(innovs)
}

fn propose_step(
    method: SearchMethod,
    start: &SearchStart<'_>,
    grad_hess_grad: f64,
    x_bias: f64,
    trust_radius: f64,
) -> Result<DoglegStep, BpeError> {
    match method {
        SearchMethod::TrustRegion => Ok(double_dogleg(
            start.newton_delta,
            &start.estimate.gradient,
            grad_hess_grad,
            x_bias,
            trust_radius,
        )),
        SearchMethod::LevenbergMarquardt => {
            let delta = levenberg_marquardt_step(
                &start.estimate.jacobian,
                start.innovs,
                1.0 / trust_radius,
            )?;
            Ok(DoglegStep {
                step_len: delta.norm(),
                delta,
                step_scale: 1.0,
                step_type: StepType::LevenbergMarquardt,
            })
        }
    }
}

/// Search for an improving step around `start`.
///
/// Trial parameters are written into `model_args` through the model's
/// setter. On return `model_args` holds the best parameters found, or the
/// starting parameters when nothing improved.
pub fn dogleg_search<M: EstimationModel>(
    opts: &OptiOpts<M>,
    model_args: &mut M::Args,
    results: &mut BpeResults,
    scaling: &ParamScaling,
    start: SearchStart<'_>,
) -> Result<SearchOutcome, BpeError> {
    let settings = opts.settings();
    let verbosity = opts.verbosity();
    let names = opts.param_names();
    let model = opts.model();
    let trial_logs = verbosity.allows(Verbosity::TRIAL);

    let gradient = &start.estimate.gradient;
    let hessian = &start.estimate.hessian;
    let grad_hess_grad = gradient.dot(&(hessian * gradient));

    let mut trust_radius = start.trust_radius;
    let mut num_shrinks = 0;
    let mut try_again = true;
    let mut tried_expanding = false;
    let mut tried_shrinking = false;
    let mut best_cost = start.cost;
    let mut accepted: Option<Accepted> = None;

    let mut last_step_type = StepType::Newton;
    let mut last_step_len = 0.0;
    let mut last_step_scale = 1.0;
    let mut last_pred = 0.0;

    while num_shrinks < settings.step_limit && try_again {
        let step = propose_step(
            settings.search_method,
            &start,
            grad_hess_grad,
            settings.x_bias,
            trust_radius,
        )?;
        let pred_func_change = predict_func_change(&step.delta, gradient, hessian)?;

        last_step_type = step.step_type;
        last_step_len = step.step_len;
        last_step_scale = step.step_scale;
        last_pred = pred_func_change;

        if trial_logs {
            trace!(
                "Tried a {} step of length: {}, (with scale: {})",
                step.step_type,
                step.step_len,
                step.step_scale
            );
        }

        let trial = start.params + &step.delta;
        model.set_params(names, &scaling.to_model(&trial), model_args);
        let (_, trial_innovs) = evaluate(opts, results, Some(&*model_args), None);
        let trial_cost = cost_of(&trial_innovs, settings.is_max_like);

        if trial_logs {
            trace!("New trial cost: {}", trial_cost);
        }

        if trial_cost < best_cost {
            if trial_logs {
                trace!("with improvement of: {}", best_cost - trial_cost);
            }
            best_cost = trial_cost;
            accepted = Some(Accepted {
                params: trial,
                innovs: trial_innovs,
                cost: trial_cost,
            });

            if step.step_type == StepType::Newton {
                trust_radius = step.step_len;
                try_again = false;
            } else if tried_shrinking {
                try_again = false;
            } else {
                // LM steps are shorter than the radius, so grow the radius itself.
                trust_radius = match settings.search_method {
                    SearchMethod::TrustRegion => settings.grow_radius * step.step_len,
                    SearchMethod::LevenbergMarquardt => settings.grow_radius * trust_radius,
                };
                tried_expanding = true;
            }
        } else {
            if trial_logs {
                trace!("and no improvement");
            }
            if tried_expanding {
                // Expansion overshot: fall back to the previous improvement.
                trust_radius /= settings.grow_radius;
                if let Some(best) = accepted.as_mut() {
                    model.set_params(names, &scaling.to_model(&best.params), model_args);
                    let (_, innovs) = evaluate(opts, results, Some(&*model_args), None);
                    best.innovs = innovs;
                }
                try_again = false;
            } else {
                tried_shrinking = true;
                if step.step_type == StepType::Newton {
                    trust_radius = settings.shrink_radius * step.step_len;
                } else {
                    trust_radius *= settings.shrink_radius;
                }
                num_shrinks += 1;
            }
        }
    }

    if try_again && trial_logs {
        warn!("Died on step cuts.");
    }

    let improved = accepted.is_some();
    let (params, innovs, cost) = match accepted {
        Some(best) => {
            if verbosity.allows(Verbosity::SUMMARY) {
                info!(
                    "New parameters are: {:?}",
                    scaling.to_model(&best.params).as_slice()
                );
            }
            (best.params, best.innovs, best.cost)
        }
        None => {
            model.set_params(names, &scaling.to_model(start.params), model_args);
            (start.params.clone(), start.innovs.clone(), start.cost)
        }
    };

    Ok(SearchOutcome {
        trust_radius,
        improved,
        params,
        innovs,
        cost,
        num_shrinks,
        step_type: last_step_type,
        step_len: last_step_len,
        step_scale: last_step_scale,
        pred_func_change: last_pred,
    })
}
