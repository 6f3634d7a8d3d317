//! # bpe_optimiser
//!
//! Batch parameter estimation engine.
//!
//! Estimates the parameters of an opaque model by minimising half the sum of
//! squared innovations, using a finite-difference Jacobian and either a
//! double-dogleg trust-region search or a Levenberg-Marquardt search.
//!
//! ## Architecture Position
//!
//! Layer 2, the engine. Depends on `bpe_core` (L1) for parameter metadata, the
//! model interface and the step math.
//!
//! ## Modules
//!
//! - `config`: Estimation options, tunable settings and their file/env loading
//! - `evaluation`: One model + cost evaluation with innovation sanitising
//! - `jacobian`: Finite-difference Jacobian, gradient and Gauss-Newton Hessian
//! - `convergence`: The three stopping criteria
//! - `search`: Trust-region search controller
//! - `driver`: Outer iteration loop (`run_bpe`)
//! - `analysis`: SVD-based covariance, correlation and information matrices
//! - `results`: The result aggregate and its persistence
//!
//! ## Example
//!
//! ```
//! use bpe_core::traits::ClosureModel;
//! use bpe_core::types::{OptiParam, Verbosity};
//! use bpe_optimiser::{run_bpe, OptiOpts};
//! use nalgebra::DVector;
//!
//! // Fit a single offset: innovations are (x - 3) at five points.
//! let model = ClosureModel::builder()
//!     .model(|x: &f64| *x)
//!     .cost(|x: &f64, _: &()| DVector::from_element(5, x - 3.0))
//!     .getter(|_: &[String], x: &f64| DVector::from_element(1, *x))
//!     .setter(|_: &[String], v: &DVector<f64>, x: &mut f64| *x = v[0])
//!     .build()
//!     .unwrap();
//!
//! let opts = OptiOpts::builder(model)
//!     .model_args(0.0)
//!     .cost_args(())
//!     .param(OptiParam::new("x"))
//!     .verbosity(Verbosity::SILENT)
//!     .build()
//!     .unwrap();
//!
//! let run = run_bpe(&opts).unwrap();
//! let fitted = run.results.final_params.unwrap();
//! assert!((fitted[0] - 3.0).abs() < 1e-6);
//! ```

pub mod analysis;
pub mod config;
pub mod convergence;
pub mod driver;
pub mod evaluation;
pub mod jacobian;
pub mod results;
pub mod search;

mod error;

pub use config::{EstimatorSettings, OptiOpts, OptiOptsBuilder, SearchMethod, SlopeMethod};
pub use driver::{run_bpe, validate_opti_opts, BpeRun};
pub use error::BpeError;
pub use results::{BpeResults, ResultsFormat, StepInfo};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::analysis::*;
    pub use crate::config::*;
    pub use crate::convergence::*;
    pub use crate::driver::*;
    pub use crate::results::*;
    pub use crate::BpeError;
    pub use bpe_core::traits::{ClosureModel, EstimationModel};
    pub use bpe_core::types::{OptiParam, ParamField, Verbosity};
}
