//! Numerical building blocks for the estimator.
//!
//! - `linalg`: SVD-based least squares and sum-of-squares helpers
//! - `solvers`: Step proposers (Levenberg-Marquardt, double dogleg) and the
//!   quadratic cost-change predictor

pub mod linalg;
pub mod solvers;
