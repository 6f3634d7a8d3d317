//! Error types for estimator configuration and step math.
//!
//! This module provides:
//! - `ConfigError`: Precondition violations detected before any model evaluation
//! - `SolverError`: Failures of the dense linear algebra behind a step proposal

use thiserror::Error;

/// Configuration errors.
///
/// Raised while building or validating estimation options. A run never
/// starts when one of these is returned, so no model evaluation has
/// happened yet.
///
/// # Examples
/// ```
/// use bpe_core::types::ConfigError;
///
/// let err = ConfigError::UnknownSearchMethod("simplex".to_string());
/// assert!(format!("{}", err).contains("simplex"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// One of the model, cost, getter or setter callables was not supplied.
    #[error("Missing callable: {name}")]
    MissingCallable {
        /// Which callable is missing
        name: String,
    },

    /// A model or cost argument bundle was not supplied.
    #[error("Missing argument bundle: {name}")]
    MissingArgs {
        /// Which bundle is missing
        name: String,
    },

    /// The parameter list is empty.
    #[error("Parameter list must not be empty")]
    EmptyParameters,

    /// Two parameters share the same name.
    #[error("Duplicate parameter name: {name}")]
    DuplicateParameter {
        /// The repeated name
        name: String,
    },

    /// A typical scale is non-finite, or zero under normalisation.
    #[error("Invalid typical value for parameter {name}: {value} (must be finite, and non-zero when normalized)")]
    InvalidTypical {
        /// Parameter name
        name: String,
        /// Offending value
        value: f64,
    },

    /// A starting value is non-finite.
    #[error("Non-finite starting value for parameter {name}: {value}")]
    NonFiniteParameter {
        /// Parameter name
        name: String,
        /// Offending value
        value: f64,
    },

    /// Slope method string not recognised.
    #[error("Unknown slope method: {0} (expected one_sided or two_sided)")]
    UnknownSlopeMethod(String),

    /// Search method string not recognised.
    #[error("Unknown search method: {0} (expected trust_region or levenberg_marquardt)")]
    UnknownSearchMethod(String),

    /// Parameter field name not recognised.
    #[error("Unknown parameter field: {0} (expected best, min, max or typical)")]
    UnknownParamField(String),

    /// A tunable setting is out of range.
    #[error("Invalid setting {name} = {value}: {reason}")]
    InvalidSetting {
        /// Setting name
        name: String,
        /// Rendered value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Verbosity outside 0..=10.
    #[error("Invalid verbosity level: {0} (must be between 0 and 10)")]
    InvalidVerbosity(i64),

    /// Settings file could not be read or parsed.
    #[error("Settings file error: {0}")]
    FileError(String),
}

impl ConfigError {
    /// Create a missing callable error.
    pub fn missing_callable(name: impl Into<String>) -> Self {
        Self::MissingCallable { name: name.into() }
    }

    /// Create a missing argument bundle error.
    pub fn missing_args(name: impl Into<String>) -> Self {
        Self::MissingArgs { name: name.into() }
    }

    /// Create an invalid setting error.
    pub fn invalid_setting(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSetting {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Check if this error concerns the parameter list.
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyParameters
                | Self::DuplicateParameter { .. }
                | Self::InvalidTypical { .. }
                | Self::NonFiniteParameter { .. }
        )
    }

    /// Check if this error is an unrecognised method string.
    pub fn is_unknown_method(&self) -> bool {
        matches!(
            self,
            Self::UnknownSlopeMethod(_) | Self::UnknownSearchMethod(_)
        )
    }
}

/// Step math errors.
///
/// # Examples
/// ```
/// use bpe_core::types::SolverError;
///
/// let err = SolverError::DimensionMismatch {
///     context: "gradient".to_string(),
///     expected: 2,
///     found: 3,
/// };
/// assert!(format!("{}", err).contains("gradient"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// Operand shapes do not agree.
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Which operand was mis-shaped
        context: String,
        /// Expected length
        expected: usize,
        /// Actual length
        found: usize,
    },

    /// A matrix decomposition did not converge.
    #[error("Decomposition failed: {0}")]
    DecompositionFailed(String),

    /// Numerical instability during computation.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

impl SolverError {
    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    /// Check if this is a dimension mismatch.
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // ConfigError Tests
    // ========================================

    #[test]
    fn test_missing_callable_display() {
        let err = ConfigError::missing_callable("setter");
        assert_eq!(format!("{}", err), "Missing callable: setter");
    }

    #[test]
    fn test_invalid_setting_display() {
        let err = ConfigError::invalid_setting("x_bias", 1.5, "must be within [0, 1]");
        let msg = format!("{}", err);
        assert!(msg.contains("x_bias"));
        assert!(msg.contains("1.5"));
        assert!(msg.contains("[0, 1]"));
    }

    #[test]
    fn test_is_parameter_error() {
        assert!(ConfigError::EmptyParameters.is_parameter_error());
        assert!(ConfigError::DuplicateParameter {
            name: "a".to_string()
        }
        .is_parameter_error());
        assert!(!ConfigError::InvalidVerbosity(11).is_parameter_error());
    }

    #[test]
    fn test_is_unknown_method() {
        assert!(ConfigError::UnknownSlopeMethod("central".to_string()).is_unknown_method());
        assert!(ConfigError::UnknownSearchMethod("bfgs".to_string()).is_unknown_method());
        assert!(!ConfigError::EmptyParameters.is_unknown_method());
    }

    #[test]
    fn test_config_error_is_std_error() {
        let err = ConfigError::EmptyParameters;
        let _: &dyn std::error::Error = &err;
    }

    // ========================================
    // SolverError Tests
    // ========================================

    #[test]
    fn test_dimension_mismatch() {
        let err = SolverError::dimension_mismatch("hessian", 2, 3);
        assert!(err.is_dimension_mismatch());
        assert_eq!(
            format!("{}", err),
            "Dimension mismatch in hessian: expected 2, found 3"
        );
    }

    #[test]
    fn test_solver_error_clone_eq() {
        let err = SolverError::DecompositionFailed("svd".to_string());
        assert_eq!(err.clone(), err);
        assert!(!err.is_dimension_mismatch());
    }
}
