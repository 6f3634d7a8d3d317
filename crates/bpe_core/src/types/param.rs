//! Per-parameter metadata.
//!
//! The order of a parameter list is significant: it fixes the column order of
//! the Jacobian and the element order of every vector exchanged with the
//! model's getter and setter.

use std::fmt;
use std::str::FromStr;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Metadata for a single estimated parameter.
///
/// `min` and `max` are carried for reporting only; the step math does not
/// enforce them.
///
/// # Examples
/// ```
/// use bpe_core::types::OptiParam;
///
/// let p = OptiParam::new("gain").with_best(2.5).with_typical(10.0);
/// assert_eq!(p.name, "gain");
/// assert_eq!(p.min, f64::NEG_INFINITY);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptiParam {
    /// Unique name. May encode a dotted path into the model's state.
    pub name: String,
    /// Starting (and, after a run, best) value.
    pub best: f64,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Non-zero scale used for perturbation sizing and normalisation.
    pub typical: f64,
}

impl Default for OptiParam {
    fn default() -> Self {
        Self {
            name: String::new(),
            best: 0.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            typical: 1.0,
        }
    }
}

impl OptiParam {
    /// Create a parameter with default value 0, unbounded, typical scale 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the starting value.
    pub fn with_best(mut self, best: f64) -> Self {
        self.best = best;
        self
    }

    /// Set the lower and upper bounds.
    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the typical scale.
    pub fn with_typical(mut self, typical: f64) -> Self {
        self.typical = typical;
        self
    }

    /// Value of the selected field.
    pub fn field(&self, field: ParamField) -> f64 {
        match field {
            ParamField::Best => self.best,
            ParamField::Min => self.min,
            ParamField::Max => self.max,
            ParamField::Typical => self.typical,
        }
    }
}

/// Selects one numeric field of [`OptiParam`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamField {
    /// Starting / best value
    Best,
    /// Lower bound
    Min,
    /// Upper bound
    Max,
    /// Typical scale
    Typical,
}

impl FromStr for ParamField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(ParamField::Best),
            "min" | "min_" => Ok(ParamField::Min),
            "max" | "max_" => Ok(ParamField::Max),
            "typical" => Ok(ParamField::Typical),
            other => Err(ConfigError::UnknownParamField(other.to_string())),
        }
    }
}

impl fmt::Display for ParamField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamField::Best => "best",
            ParamField::Min => "min",
            ParamField::Max => "max",
            ParamField::Typical => "typical",
        };
        write!(f, "{}", name)
    }
}

/// Collect one field across a parameter list, in list order.
pub fn param_array(params: &[OptiParam], field: ParamField) -> DVector<f64> {
    DVector::from_iterator(params.len(), params.iter().map(|p| p.field(field)))
}

/// Collect the parameter names, in list order.
pub fn param_names(params: &[OptiParam]) -> Vec<String> {
    params.iter().map(|p| p.name.clone()).collect()
}
