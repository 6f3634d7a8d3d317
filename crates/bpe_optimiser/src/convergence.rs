//! Convergence tests.
//!
//! An iteration is converged when ANY of these holds:
//! - the gradient cosine `cosmax` is at most `tol_cosmax_grad`
//! - the Gauss-Newton step length is at most `tol_delta_step`
//! - the absolute predicted cost change is at most `tol_delta_cost`

use std::fmt;

use bpe_core::types::Verbosity;
use nalgebra::{DMatrix, DVector};
use tracing::info;

use crate::config::EstimatorSettings;

/// A satisfied stopping criterion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConvergenceReason {
    /// Innovations are nearly orthogonal to every Jacobian column.
    GradientCosine {
        /// Observed cosmax
        cosmax: f64,
        /// Tolerance
        tol: f64,
    },
    /// Gauss-Newton step is negligibly short.
    StepLength {
        /// Observed step length
        step_len: f64,
        /// Tolerance
        tol: f64,
    },
    /// Predicted cost change is negligible.
    CostChange {
        /// Observed predicted change
        pred_func_change: f64,
        /// Tolerance
        tol: f64,
    },
}

impl fmt::Display for ConvergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvergenceReason::GradientCosine { cosmax, tol } => write!(
                f,
                "cosmax of {} <= tol_cosmax_grad of {}",
                cosmax, tol
            ),
            ConvergenceReason::StepLength { step_len, tol } => write!(
                f,
                "delta_step_len of {} <= tol_delta_step of {}",
                step_len, tol
            ),
            ConvergenceReason::CostChange {
                pred_func_change,
                tol,
            } => write!(
                f,
                "abs(pred_func_change) of {} <= tol_delta_cost of {}",
                pred_func_change.abs(),
                tol
            ),
        }
    }
}

/// Outcome of one convergence test. Every satisfied criterion is listed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConvergenceCheck {
    /// Satisfied criteria, in check order.
    pub reasons: Vec<ConvergenceReason>,
}

impl ConvergenceCheck {
    /// Whether any criterion was satisfied.
    pub fn is_converged(&self) -> bool {
        !self.reasons.is_empty()
    }
}

/// Evaluate the three stopping criteria.
pub fn check_for_convergence(
    settings: &EstimatorSettings,
    verbosity: Verbosity,
    cosmax: f64,
    delta_step_len: f64,
    pred_func_change: f64,
) -> ConvergenceCheck {
    let mut reasons = Vec::new();

    if cosmax <= settings.tol_cosmax_grad {
        reasons.push(ConvergenceReason::GradientCosine {
            cosmax,
            tol: settings.tol_cosmax_grad,
        });
    }
    if delta_step_len <= settings.tol_delta_step {
        reasons.push(ConvergenceReason::StepLength {
            step_len: delta_step_len,
            tol: settings.tol_delta_step,
        });
    }
    if pred_func_change.abs() <= settings.tol_delta_cost {
        reasons.push(ConvergenceReason::CostChange {
            pred_func_change,
            tol: settings.tol_delta_cost,
        });
    }

    if verbosity.allows(Verbosity::SUMMARY) {
        for reason in &reasons {
            info!("Declare convergence because {}", reason);
        }
    }

    ConvergenceCheck { reasons }
}

/// Largest absolute cosine between the innovations and a Jacobian column.
///
/// ```text
/// cosmax = max_j |J_jᵀ r| / (‖J_j‖ ‖r‖)
/// ```
///
/// Zero innovations give `0`. Columns with zero norm are skipped.
///
/// # Examples
///
/// ```
/// use bpe_optimiser::convergence::compute_cosmax;
/// use nalgebra::{DMatrix, DVector};
///
/// let jacobian = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
/// let innovs = DVector::from_vec(vec![3.0, 4.0]);
/// assert!((compute_cosmax(&jacobian, &innovs) - 0.8).abs() < 1e-15);
/// ```
pub fn compute_cosmax(jacobian: &DMatrix<f64>, innovs: &DVector<f64>) -> f64 {
    let innov_norm = innovs.norm();
    if innov_norm == 0.0 {
        return 0.0;
    }
    jacobian
        .column_iter()
        .filter_map(|col| {
            let col_norm = col.norm();
            (col_norm > 0.0).then(|| col.dot(innovs).abs() / (col_norm * innov_norm))
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings() -> EstimatorSettings {
        EstimatorSettings {
            tol_cosmax_grad: 1e-4,
            tol_delta_step: 1e-8,
            tol_delta_cost: 1e-10,
            ..Default::default()
        }
    }

    // ========================================
    // check_for_convergence Tests
    // ========================================

    #[test]
    fn test_not_converged() {
        let check = check_for_convergence(&settings(), Verbosity::SILENT, 0.5, 1.0, -2.0);
        assert!(!check.is_converged());
        assert!(check.reasons.is_empty());
    }

    #[test]
    fn test_each_reason_independently() {
        let s = settings();
        let check = check_for_convergence(&s, Verbosity::SILENT, 1e-5, 1.0, -2.0);
        assert_eq!(
            check.reasons,
            vec![ConvergenceReason::GradientCosine {
                cosmax: 1e-5,
                tol: 1e-4
            }]
        );

        let check = check_for_convergence(&s, Verbosity::SILENT, 0.5, 1e-9, -2.0);
        assert!(matches!(
            check.reasons[..],
            [ConvergenceReason::StepLength { .. }]
        ));

        let check = check_for_convergence(&s, Verbosity::SILENT, 0.5, 1.0, -1e-11);
        assert!(matches!(
            check.reasons[..],
            [ConvergenceReason::CostChange { .. }]
        ));
    }

    #[test]
    fn test_all_reasons_reported() {
        let check = check_for_convergence(&settings(), Verbosity::default(), 0.0, 0.0, 0.0);
        assert_eq!(check.reasons.len(), 3);
        assert!(check.is_converged());
    }

    #[test]
    fn test_cost_change_uses_absolute_value() {
        let s = settings();
        assert!(check_for_convergence(&s, Verbosity::SILENT, 1.0, 1.0, 5e-11).is_converged());
        assert!(check_for_convergence(&s, Verbosity::SILENT, 1.0, 1.0, -5e-11).is_converged());
    }

    #[test]
    fn test_reason_display() {
        let reason = ConvergenceReason::StepLength {
            step_len: 0.0,
            tol: 1e-20,
        };
        assert!(reason.to_string().contains("tol_delta_step"));
    }

    // ========================================
    // compute_cosmax Tests
    // ========================================

    #[test]
    fn test_cosmax_zero_innovations() {
        let j = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        assert_eq!(compute_cosmax(&j, &DVector::zeros(2)), 0.0);
    }

    #[test]
    fn test_cosmax_parallel_column() {
        let j = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 2.0, -1.0]);
        let r = DVector::from_vec(vec![1.0, 1.0]);
        assert_relative_eq!(compute_cosmax(&j, &r), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_cosmax_skips_zero_columns() {
        let j = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]);
        let r = DVector::from_vec(vec![0.0, 1.0]);
        assert_eq!(compute_cosmax(&j, &r), 0.0);
    }
}
