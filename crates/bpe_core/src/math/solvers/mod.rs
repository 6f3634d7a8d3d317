//! Step proposers and the quadratic cost-change predictor.
//!
//! This module provides the pieces one trust-region trial is built from:
//! - [`levenberg_marquardt_step`]: damped Gauss-Newton solve through an
//!   augmented least-squares system
//! - [`double_dogleg`]: trust-region step along the path blending the Cauchy
//!   and Newton directions
//! - [`predict_func_change`]: second-order Taylor prediction of the cost change
//!
//! # Example
//!
//! ```
//! use bpe_core::math::solvers::{double_dogleg, levenberg_marquardt_step, StepType};
//! use nalgebra::{DMatrix, DVector};
//!
//! let jacobian = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]);
//! let innovs = DVector::from_vec(vec![4.0, 1.0]);
//! let gradient = jacobian.transpose() * &innovs;
//! let hessian = jacobian.transpose() * &jacobian;
//!
//! let newton = levenberg_marquardt_step(&jacobian, &innovs, 0.0).unwrap();
//! let ghg = gradient.dot(&(&hessian * &gradient));
//!
//! // A generous trust radius admits the full Newton step.
//! let step = double_dogleg(&newton, &gradient, ghg, 0.8, 10.0);
//! assert_eq!(step.step_type, StepType::Newton);
//! ```

mod dogleg;
mod levenberg_marquardt;
mod prediction;

pub use dogleg::{double_dogleg, DoglegStep, StepType};
pub use levenberg_marquardt::levenberg_marquardt_step;
pub use prediction::predict_func_change;
