//! Levenberg-Marquardt step proposer.
//!
//! # Algorithm
//!
//! The damped Gauss-Newton step solves
//!
//! ```text
//! (J^T J + λI) δ = -J^T r
//! ```
//!
//! without forming `J^T J`, by stacking the damping into an augmented
//! least-squares problem:
//!
//! ```text
//! min_δ || [ J    ] δ + [ r ] ||^2
//!         || [ √λ I ]     [ 0 ] ||
//! ```
//!
//! where:
//! - `J` is the Jacobian of the innovations
//! - `r` is the innovation vector
//! - `λ` is the damping factor
//! - `δ` is the parameter update
//!
//! As `λ → 0` the step becomes the pure Gauss-Newton step; for large `λ` it
//! shrinks towards `-J^T r / λ`, a short steepest-descent step.

use nalgebra::{DMatrix, DVector};

use crate::math::linalg::lstsq;
use crate::types::SolverError;

/// Levenberg-Marquardt parameter update.
///
/// A non-positive `lambda` gives the undamped Gauss-Newton step, i.e. the
/// minimum-norm solution of `J δ ≈ -r`.
///
/// # Arguments
///
/// * `jacobian` - `m × n` Jacobian of the innovations
/// * `innovs` - innovation vector of length `m`
/// * `lambda` - damping factor
///
/// # Returns
///
/// * `Ok(DVector)` - parameter update of length `n`
/// * `Err(SolverError)` - on shape mismatch or a failed decomposition
///
/// # Example
///
/// ```
/// use bpe_core::math::solvers::levenberg_marquardt_step;
/// use nalgebra::{DMatrix, DVector};
///
/// let jacobian = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
/// let innovs = DVector::from_vec(vec![7.0, 8.0, 9.0]);
///
/// let delta = levenberg_marquardt_step(&jacobian, &innovs, 5.0).unwrap();
/// assert!((delta[0] + 0.46825397).abs() < 1e-8);
/// assert!((delta[1] + 1.3015873).abs() < 1e-7);
/// ```
pub fn levenberg_marquardt_step(
    jacobian: &DMatrix<f64>,
    innovs: &DVector<f64>,
    lambda: f64,
) -> Result<DVector<f64>, SolverError> {
    let (n_innovs, n_params) = jacobian.shape();
    if innovs.len() != n_innovs {
        return Err(SolverError::dimension_mismatch(
            "innovations",
            n_innovs,
            innovs.len(),
        ));
    }

    let delta = if lambda <= 0.0 {
        lstsq(jacobian, innovs)?
    } else {
        let mut aug_jacobian = DMatrix::zeros(n_innovs + n_params, n_params);
        aug_jacobian.rows_mut(0, n_innovs).copy_from(jacobian);
        aug_jacobian
            .rows_mut(n_innovs, n_params)
            .fill_diagonal(lambda.sqrt());

        let mut aug_innovs = DVector::zeros(n_innovs + n_params);
        aug_innovs.rows_mut(0, n_innovs).copy_from(innovs);

        lstsq(&aug_jacobian, &aug_innovs)?
    };

    Ok(-delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn sample_problem() -> (DMatrix<f64>, DVector<f64>) {
        (
            DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            DVector::from_vec(vec![7.0, 8.0, 9.0]),
        )
    }

    /// `(J^T J + λI) δ = -J^T r` solved directly.
    fn normal_equations(jacobian: &DMatrix<f64>, innovs: &DVector<f64>, lambda: f64) -> DVector<f64> {
        let n = jacobian.ncols();
        let lhs = jacobian.transpose() * jacobian + DMatrix::identity(n, n) * lambda;
        let rhs = -(jacobian.transpose() * innovs);
        lhs.lu().solve(&rhs).unwrap()
    }

    // ========================================
    // Damped Step Tests
    // ========================================

    #[test]
    fn test_damped_known_values() {
        let (jacobian, innovs) = sample_problem();
        let delta = levenberg_marquardt_step(&jacobian, &innovs, 5.0).unwrap();
        assert_relative_eq!(delta[0], -0.46825397, epsilon = 1e-8);
        assert_relative_eq!(delta[1], -1.3015873, epsilon = 1e-7);
    }

    #[test]
    fn test_large_lambda_approaches_scaled_gradient() {
        let (jacobian, innovs) = sample_problem();
        let lambda = 1e8;
        let delta = levenberg_marquardt_step(&jacobian, &innovs, lambda).unwrap();
        let gradient = jacobian.transpose() * &innovs;
        for i in 0..2 {
            assert_relative_eq!(delta[i], -gradient[i] / lambda, max_relative = 1e-5);
        }
    }

    // ========================================
    // Gauss-Newton Step Tests
    // ========================================

    #[test]
    fn test_zero_lambda_is_gauss_newton() {
        let (jacobian, innovs) = sample_problem();
        let delta = levenberg_marquardt_step(&jacobian, &innovs, 0.0).unwrap();
        let expected = normal_equations(&jacobian, &innovs, 0.0);
        assert_relative_eq!(delta, expected, epsilon = 1e-8);
    }

    #[test]
    fn test_negative_lambda_treated_as_zero() {
        let (jacobian, innovs) = sample_problem();
        let a = levenberg_marquardt_step(&jacobian, &innovs, -1.0).unwrap();
        let b = levenberg_marquardt_step(&jacobian, &innovs, 0.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_exact_linear_system_recovers_root() {
        // r(p) = J p - y, evaluated at p = 0
        let jacobian = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 3.0]);
        let target = DVector::from_vec(vec![3.0, 5.0]);
        let innovs = -&target;
        let delta = levenberg_marquardt_step(&jacobian, &innovs, 0.0).unwrap();
        assert_relative_eq!(&jacobian * &delta, target, epsilon = 1e-12);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (jacobian, _) = sample_problem();
        let innovs = DVector::from_vec(vec![1.0, 2.0]);
        let err = levenberg_marquardt_step(&jacobian, &innovs, 1.0).unwrap_err();
        assert!(err.is_dimension_mismatch());
    }

    // ========================================
    // Property Tests
    // ========================================

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_matches_normal_equations(
            entries in prop::collection::vec(-5.0f64..5.0, 8),
            innovs in prop::collection::vec(-10.0f64..10.0, 4),
            lambda in 1e-3f64..100.0,
        ) {
            let jacobian = DMatrix::from_row_slice(4, 2, &entries);
            let innovs = DVector::from_vec(innovs);

            let delta = levenberg_marquardt_step(&jacobian, &innovs, lambda).unwrap();
            let expected = normal_equations(&jacobian, &innovs, lambda);

            let scale = expected.norm().max(1.0);
            prop_assert!((delta - expected).norm() <= 1e-8 * scale);
        }
    }
}
