//! Single model evaluation.

use bpe_core::traits::EstimationModel;
use nalgebra::DVector;

use crate::config::OptiOpts;
use crate::results::BpeResults;

/// Run the model once and compute its innovations.
///
/// The argument bundles default to the ones stored in `opts`; the driver
/// passes its working copy of the model arguments instead. Every call
/// increments `results.num_evals` by exactly one. Non-finite innovations are
/// replaced by zero.
pub fn evaluate<M: EstimationModel>(
    opts: &OptiOpts<M>,
    results: &mut BpeResults,
    model_args: Option<&M::Args>,
    cost_args: Option<&M::CostArgs>,
) -> (M::Output, DVector<f64>) {
    let model = opts.model();
    let model_args = model_args.unwrap_or_else(|| opts.model_args());
    let cost_args = cost_args.unwrap_or_else(|| opts.cost_args());

    let output = model.simulate(model_args);
    results.num_evals += 1;

    let mut innovs = model.innovations(&output, cost_args);
    sanitize_innovations(&mut innovs);
    (output, innovs)
}

/// Replace NaN and infinite entries with zero.
pub fn sanitize_innovations(innovs: &mut DVector<f64>) {
    for value in innovs.iter_mut() {
        if !value.is_finite() {
            *value = 0.0;
        }
    }
}
