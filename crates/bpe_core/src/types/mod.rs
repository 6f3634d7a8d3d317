//! Parameter, verbosity and error types.
//!
//! This module provides:
//! - `param`: Per-parameter metadata (`OptiParam`) and field selection (`ParamField`)
//! - `verbosity`: The 0-10 verbosity level and its emission thresholds
//! - `error`: Structured error types for configuration and step math
//!
//! # Re-exports
//!
//! - [`OptiParam`], [`ParamField`], [`param_array`], [`param_names`] from `param`
//! - [`Verbosity`] from `verbosity`
//! - [`ConfigError`], [`SolverError`] from `error`

pub mod error;
pub mod param;
pub mod verbosity;

pub use error::{ConfigError, SolverError};
pub use param::{param_array, param_names, OptiParam, ParamField};
pub use verbosity::Verbosity;
