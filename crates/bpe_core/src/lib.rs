//! # bpe_core: Foundation for Batch Parameter Estimation
//!
//! ## Layer 1 (Foundation) Role
//!
//! bpe_core is the bottom layer of the estimator workspace, providing:
//! - Parameter metadata: `OptiParam`, `ParamField` (`types::param`)
//! - Verbosity levels consulted by every component (`types::verbosity`)
//! - Error types: `ConfigError`, `SolverError` (`types::error`)
//! - The four-function model interface: `EstimationModel`, `ClosureModel` (`traits`)
//! - Dense least-squares helpers (`math::linalg`)
//! - Step proposers and the quadratic cost-change predictor (`math::solvers`)
//!
//! ## Minimal Dependency Principle
//!
//! Layer 1 has no dependencies on other bpe_* crates:
//! - nalgebra: dense vectors, matrices and the SVD
//! - thiserror: error enums
//! - serde: parameter metadata serialisation
//!
//! ## Usage Examples
//!
//! ```rust
//! use bpe_core::math::solvers::{levenberg_marquardt_step, predict_func_change};
//! use nalgebra::{DMatrix, DVector};
//!
//! let jacobian = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! let innovs = DVector::from_vec(vec![7.0, 8.0, 9.0]);
//!
//! // Pure Gauss-Newton step
//! let delta = levenberg_marquardt_step(&jacobian, &innovs, 0.0).unwrap();
//!
//! let gradient = jacobian.transpose() * &innovs;
//! let hessian = jacobian.transpose() * &jacobian;
//! let pred = predict_func_change(&delta, &gradient, &hessian).unwrap();
//! assert!(pred < 0.0);
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod math;
pub mod traits;
pub mod types;
