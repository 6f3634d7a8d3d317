//! Quadratic-model prediction of the cost change.

use nalgebra::{DMatrix, DVector};

use crate::types::SolverError;

/// Predicted change in cost for a parameter update.
///
/// ```text
/// Δf ≈ g·δ + ½ δᵀ H δ
/// ```
///
/// Fails with [`SolverError::DimensionMismatch`] when the gradient or Hessian
/// does not match the length of `delta`, since the product would not reduce
/// to a single number.
///
/// # Example
///
/// ```
/// use bpe_core::math::solvers::predict_func_change;
/// use nalgebra::{DMatrix, DVector};
///
/// let delta = DVector::from_vec(vec![1.0, 2.0]);
/// let gradient = DVector::from_vec(vec![3.0, 4.0]);
/// let hessian = DMatrix::from_row_slice(2, 2, &[5.0, 2.0, 2.0, 5.0]);
///
/// let change = predict_func_change(&delta, &gradient, &hessian).unwrap();
/// assert_eq!(change, 27.5);
/// ```
pub fn predict_func_change(
    delta: &DVector<f64>,
    gradient: &DVector<f64>,
    hessian: &DMatrix<f64>,
) -> Result<f64, SolverError> {
    let n = delta.len();
    if gradient.len() != n {
        return Err(SolverError::dimension_mismatch("gradient", n, gradient.len()));
    }
    if hessian.nrows() != n {
        return Err(SolverError::dimension_mismatch(
            "hessian rows",
            n,
            hessian.nrows(),
        ));
    }
    if hessian.ncols() != n {
        return Err(SolverError::dimension_mismatch(
            "hessian columns",
            n,
            hessian.ncols(),
        ));
    }

    let first_order = gradient.dot(delta);
    let second_order = 0.5 * delta.dot(&(hessian * delta));
    Ok(first_order + second_order)
}
