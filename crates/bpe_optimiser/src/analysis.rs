//! Post-fit uncertainty analysis.
//!
//! From the singular value decomposition `J = U S Vᵀ` of the final Jacobian:
//!
//! ```text
//! covariance  = V diag(S⁻²) Vᵀ
//! one_sigma   = sqrt(diag(covariance))
//! correlation = covariance ./ (one_sigma one_sigmaᵀ)
//! info_svd    = Vᵀ
//! ```
//!
//! With normalisation the correlation comes from the Jacobian scaled by the
//! typical values, while covariance and `info_svd` come from a second pass
//! over the Jacobian in model units.

use bpe_core::math::linalg::try_svd;
use bpe_core::types::{SolverError, Verbosity};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

/// Covariance, correlation and information matrices of a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PostFitAnalysis {
    /// Parameter covariance, model units.
    pub covariance: DMatrix<f64>,
    /// Parameter correlation.
    pub correlation: DMatrix<f64>,
    /// Right singular vectors, transposed.
    pub info_svd: DMatrix<f64>,
    /// `sqrt(diag(covariance))`.
    pub one_sigma: DVector<f64>,
}

struct Decomposition {
    covariance: DMatrix<f64>,
    v_t: DMatrix<f64>,
}

fn decompose(jacobian: &DMatrix<f64>) -> Result<Decomposition, SolverError> {
    let svd = try_svd(jacobian)?;
    let v_t = svd
        .v_t
        .ok_or_else(|| SolverError::DecompositionFailed("right singular vectors missing".into()))?;
    let inv_sq = svd.singular_values.map(|s| 1.0 / (s * s));
    let covariance = v_t.transpose() * DMatrix::from_diagonal(&inv_sq) * &v_t;
    Ok(Decomposition { covariance, v_t })
}

fn correlation_of(covariance: &DMatrix<f64>) -> (DVector<f64>, DMatrix<f64>) {
    let one_sigma = covariance.diagonal().map(f64::sqrt);
    let scale = &one_sigma * one_sigma.transpose();
    (one_sigma, covariance.component_div(&scale))
}

/// Analyse the Jacobian of a finished fit.
///
/// `jacobian` is with respect to model values. When `normalized` is set the
/// correlation is taken from `jacobian · diag(typical)`.
///
/// A failed decomposition does not abort: every matrix comes back filled
/// with NaN and a warning is logged. The computation is deterministic, so
/// repeated calls on the same input give identical results.
pub fn analyze_results(
    jacobian: &DMatrix<f64>,
    typical: &DVector<f64>,
    normalized: bool,
    verbosity: Verbosity,
) -> PostFitAnalysis {
    let num_params = jacobian.ncols();

    let first_pass = if normalized {
        jacobian * DMatrix::from_diagonal(typical)
    } else {
        jacobian.clone()
    };

    let first = match decompose(&first_pass) {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "Singular value decomposition of Jacobian failed.");
            let nan = DMatrix::from_element(num_params, num_params, f64::NAN);
            return PostFitAnalysis {
                covariance: nan.clone(),
                correlation: nan.clone(),
                info_svd: nan,
                one_sigma: DVector::from_element(num_params, f64::NAN),
            };
        }
    };

    let (_, correlation) = correlation_of(&first.covariance);

    let (covariance, info_svd) = if normalized {
        match decompose(jacobian) {
            Ok(d) => (d.covariance, d.v_t),
            Err(e) => {
                if verbosity.allows(Verbosity::DETAIL) {
                    debug!(error = %e, "Second decomposition failed, keeping the normalised pass.");
                }
                (first.covariance, first.v_t)
            }
        }
    } else {
        (first.covariance, first.v_t)
    };

    let one_sigma = covariance.diagonal().map(f64::sqrt);
    PostFitAnalysis {
        covariance,
        correlation,
        info_svd,
        one_sigma,
    }
}

/// [`analyze_results`] with the status messages of a run.
pub fn analyze_run(
    jacobian: &DMatrix<f64>,
    typical: &DVector<f64>,
    normalized: bool,
    verbosity: Verbosity,
    num_evals: usize,
) -> PostFitAnalysis {
    if verbosity.allows(Verbosity::SUMMARY) {
        info!("Analyzing final results.");
    }
    if verbosity.allows(Verbosity::DETAIL) {
        debug!(
            num_evals,
            "There were a total of {} function model evaluations.", num_evals
        );
    }
    analyze_results(jacobian, typical, normalized, verbosity)
}
