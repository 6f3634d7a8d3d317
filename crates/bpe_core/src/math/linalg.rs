//! Dense linear algebra helpers.

use nalgebra::{DMatrix, DVector, Dyn, SVD};

use crate::types::SolverError;

/// Iteration cap handed to the SVD so a pathological input cannot spin.
pub const SVD_MAX_ITERATIONS: usize = 1_000;

/// Thin SVD that reports failure instead of looping or panicking.
///
/// Fails when the input holds non-finite entries or the decomposition does not
/// converge within [`SVD_MAX_ITERATIONS`].
pub fn try_svd(matrix: &DMatrix<f64>) -> Result<SVD<f64, Dyn, Dyn>, SolverError> {
    if matrix.iter().any(|x| !x.is_finite()) {
        return Err(SolverError::DecompositionFailed(
            "matrix contains non-finite entries".to_string(),
        ));
    }
    SVD::try_new(
        matrix.clone(),
        true,
        true,
        f64::EPSILON,
        SVD_MAX_ITERATIONS,
    )
    .ok_or_else(|| SolverError::DecompositionFailed("SVD did not converge".to_string()))
}

/// Minimum-norm least-squares solution of `a · x ≈ b`.
///
/// Singular values below `eps · max(m, n) · σ_max` are treated as zero, so a
/// rank-deficient `a` still yields the minimum-norm solution.
///
/// # Examples
/// ```
/// use bpe_core::math::linalg::lstsq;
/// use nalgebra::{DMatrix, DVector};
///
/// let a = DMatrix::from_row_slice(3, 1, &[1.0, 1.0, 1.0]);
/// let b = DVector::from_vec(vec![1.0, 2.0, 3.0]);
/// let x = lstsq(&a, &b).unwrap();
/// assert!((x[0] - 2.0).abs() < 1e-12);
/// ```
pub fn lstsq(a: &DMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, SolverError> {
    if a.nrows() != b.len() {
        return Err(SolverError::dimension_mismatch(
            "least-squares right-hand side",
            a.nrows(),
            b.len(),
        ));
    }
    if a.ncols() == 0 {
        return Ok(DVector::zeros(0));
    }

    let svd = try_svd(a)?;
    let sigma_max = svd.singular_values.max();
    let cutoff = f64::EPSILON * a.nrows().max(a.ncols()) as f64 * sigma_max;
    svd.solve(b, cutoff)
        .map_err(|msg| SolverError::DecompositionFailed(msg.to_string()))
}

/// Sum of squares, ignoring NaN entries.
#[inline]
pub fn sum_of_squares(v: &DVector<f64>) -> f64 {
    v.iter().filter(|x| !x.is_nan()).map(|x| x * x).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ========================================
    // lstsq Tests
    // ========================================

    #[test]
    fn test_lstsq_square_exact() {
        // [[4, 2], [2, 2]] x = [8, 5] -> x = [1.5, 1.0]
        let a = DMatrix::from_row_slice(2, 2, &[4.0, 2.0, 2.0, 2.0]);
        let b = DVector::from_vec(vec![8.0, 5.0]);
        let x = lstsq(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_lstsq_overdetermined_matches_normal_equations() {
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = DVector::from_vec(vec![7.0, 8.0, 9.0]);
        let x = lstsq(&a, &b).unwrap();

        let ata = a.transpose() * &a;
        let atb = a.transpose() * &b;
        let expected = ata.lu().solve(&atb).unwrap();
        assert_relative_eq!(x, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_lstsq_rank_deficient_min_norm() {
        // Two identical columns: minimum-norm solution splits evenly.
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let b = DVector::from_vec(vec![2.0, 2.0]);
        let x = lstsq(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_lstsq_dimension_mismatch() {
        let a = DMatrix::<f64>::zeros(3, 2);
        let b = DVector::<f64>::zeros(2);
        assert!(lstsq(&a, &b).unwrap_err().is_dimension_mismatch());
    }

    #[test]
    fn test_lstsq_non_finite_fails() {
        let a = DMatrix::from_row_slice(2, 1, &[f64::NAN, 1.0]);
        let b = DVector::from_vec(vec![1.0, 1.0]);
        assert!(matches!(
            lstsq(&a, &b),
            Err(SolverError::DecompositionFailed(_))
        ));
    }

    // ========================================
    // sum_of_squares Tests
    // ========================================

    #[test]
    fn test_sum_of_squares() {
        let v = DVector::from_vec(vec![3.0, 4.0]);
        assert_eq!(sum_of_squares(&v), 25.0);
    }

    #[test]
    fn test_sum_of_squares_ignores_nan() {
        let v = DVector::from_vec(vec![3.0, f64::NAN, 4.0]);
        assert_eq!(sum_of_squares(&v), 25.0);
    }
}
