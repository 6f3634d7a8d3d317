//! The model interface seen by the estimator.
//!
//! The estimator treats the simulated system as four opaque operations:
//! simulate, compute innovations, read parameters, write parameters. They are
//! grouped into the [`EstimationModel`] trait so the engine depends only on
//! their signatures.
//!
//! - [`EstimationModel`]: implement directly for a model type
//! - [`ClosureModel`]: assemble one from four closures

pub mod model;

pub use model::{ClosureModel, ClosureModelBuilder, EstimationModel};
