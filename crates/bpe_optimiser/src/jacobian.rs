//! Finite-difference Jacobian estimation.
//!
//! Each parameter is perturbed in turn, written through the model's setter
//! and the innovations re-evaluated. From the resulting Jacobian `J`:
//!
//! ```text
//! gradient = Jᵀ r
//! hessian  = Jᵀ J      (Gauss-Newton approximation)
//! ```
//!
//! Perturbation sizing follows Conn, Gould & Toint, *Trust-Region Methods*,
//! section 8.4.3: `√ε · sign(p) · max(|p|, |typical|)`.

use bpe_core::traits::EstimationModel;
use bpe_core::types::{param_array, OptiParam, ParamField};
use nalgebra::{DMatrix, DVector};

use crate::config::OptiOpts;
use crate::evaluation::evaluate;
use crate::results::BpeResults;

/// Mapping between the estimator's working coordinates and model values.
///
/// Without normalisation the two coincide. With normalisation the working
/// coordinate of each parameter is its model value divided by its typical
/// value, so the trust radius and the perturbations are dimensionless.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamScaling {
    typical: DVector<f64>,
    normalized: bool,
}

impl ParamScaling {
    /// Build the scaling for a parameter list.
    pub fn new(params: &[OptiParam], normalized: bool) -> Self {
        Self {
            typical: param_array(params, ParamField::Typical),
            normalized,
        }
    }

    /// Whether working coordinates are normalised.
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Typical values, in parameter order.
    pub fn typical(&self) -> &DVector<f64> {
        &self.typical
    }

    /// Working coordinates to model values.
    pub fn to_model(&self, params: &DVector<f64>) -> DVector<f64> {
        if self.normalized {
            params.component_mul(&self.typical)
        } else {
            params.clone()
        }
    }

    /// Model values to working coordinates.
    pub fn to_working(&self, values: &DVector<f64>) -> DVector<f64> {
        if self.normalized {
            values.component_div(&self.typical)
        } else {
            values.clone()
        }
    }

    /// Jacobian with respect to model values, given one in working coordinates.
    pub fn model_jacobian(&self, jacobian: &DMatrix<f64>) -> DMatrix<f64> {
        if self.normalized {
            let inv_typical = self.typical.map(|t| 1.0 / t);
            jacobian * DMatrix::from_diagonal(&inv_typical)
        } else {
            jacobian.clone()
        }
    }
}

/// Finite-difference Jacobian with the derived gradient and Hessian.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianEstimate {
    /// `∂r/∂p`, one column per parameter.
    pub jacobian: DMatrix<f64>,
    /// `Jᵀ r`.
    pub gradient: DVector<f64>,
    /// `Jᵀ J`.
    pub hessian: DMatrix<f64>,
}

/// Perturbation applied to each parameter.
///
/// A zero parameter is perturbed upwards. When both the parameter and its
/// typical value are zero the magnitude falls back to `√ε`, so the size is
/// never zero.
///
/// # Examples
///
/// ```
/// use bpe_optimiser::jacobian::perturbation_sizes;
/// use nalgebra::DVector;
///
/// let params = DVector::from_vec(vec![0.0, -4.0]);
/// let typical = DVector::from_vec(vec![2.0, 1.0]);
/// let h = perturbation_sizes(&params, &typical, false);
///
/// let sqrt_eps = f64::EPSILON.sqrt();
/// assert_eq!(h[0], sqrt_eps * 2.0);
/// assert_eq!(h[1], -sqrt_eps * 4.0);
/// ```
pub fn perturbation_sizes(
    params: &DVector<f64>,
    typical: &DVector<f64>,
    normalized: bool,
) -> DVector<f64> {
    let sqrt_eps = f64::EPSILON.sqrt();
    params.zip_map(typical, |p, t| {
        let sign = if p < 0.0 { -1.0 } else { 1.0 };
        if normalized {
            sqrt_eps * sign
        } else {
            let scale = p.abs().max(t.abs());
            let scale = if scale > 0.0 { scale } else { 1.0 };
            sqrt_eps * sign * scale
        }
    })
}

/// Estimate the Jacobian around `params` (working coordinates).
///
/// `innovs` must be the innovations at `params`; one-sided differences are
/// taken against it. Each parameter costs one evaluation one-sided, two
/// evaluations two-sided. Perturbations are not cumulative. On return the
/// model arguments hold `params` again.
pub fn finite_differences<M: EstimationModel>(
    opts: &OptiOpts<M>,
    model_args: &mut M::Args,
    results: &mut BpeResults,
    scaling: &ParamScaling,
    params: &DVector<f64>,
    innovs: &DVector<f64>,
    two_sided: bool,
) -> JacobianEstimate {
    let names = opts.param_names();
    let model = opts.model();
    let num_param = params.len();
    let perturb = perturbation_sizes(params, scaling.typical(), scaling.is_normalized());

    let mut jacobian = DMatrix::zeros(innovs.len(), num_param);
    let mut temp_plus = params.clone();
    let mut temp_minus = params.clone();

    for i in 0..num_param {
        temp_plus[i] = params[i] + perturb[i];
        model.set_params(names, &scaling.to_model(&temp_plus), model_args);
        let (_, innovs_plus) = evaluate(opts, results, Some(&*model_args), None);

        let column = if two_sided {
            temp_minus[i] = params[i] - perturb[i];
            model.set_params(names, &scaling.to_model(&temp_minus), model_args);
            let (_, innovs_minus) = evaluate(opts, results, Some(&*model_args), None);
            (innovs_plus - innovs_minus) * (0.5 / perturb[i])
        } else {
            (innovs_plus - innovs) / perturb[i]
        };
        jacobian.set_column(i, &column);

        temp_plus[i] = params[i];
        temp_minus[i] = params[i];
    }

    model.set_params(names, &scaling.to_model(params), model_args);

    // The maximum-likelihood log-determinant correction is not modelled, so
    // the gradient is Jᵀr in both modes.
    let gradient = jacobian.transpose() * innovs;
    let hessian = jacobian.transpose() * &jacobian;

    JacobianEstimate {
        jacobian,
        gradient,
        hessian,
    }
}
