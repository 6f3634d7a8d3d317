//! Estimator error type.

use bpe_core::types::{ConfigError, SolverError};
use thiserror::Error;

/// Errors that can abort an estimation run.
///
/// Configuration errors are raised before the first model evaluation. Solver
/// errors come from a failed least-squares solve inside a step proposal.
/// Search exhaustion, iteration-budget exhaustion and a failed post-fit SVD
/// are not errors; they are logged and the run completes.
///
/// # Examples
///
/// ```
/// use bpe_core::types::ConfigError;
/// use bpe_optimiser::BpeError;
///
/// let err: BpeError = ConfigError::EmptyParameters.into();
/// assert!(err.is_config());
/// assert!(format!("{}", err).contains("must not be empty"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BpeError {
    /// Invalid estimation options.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Failure in the step math.
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    /// Filesystem failure while persisting or loading results.
    #[error("I/O error: {0}")]
    Io(String),

    /// Results could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BpeError {
    /// Create an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a solver error.
    pub fn is_solver(&self) -> bool {
        matches!(self, Self::Solver(_))
    }

    /// Check if this is a persistence error.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Serialization(_))
    }
}

impl From<std::io::Error> for BpeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // Display Tests
    // ========================================

    #[test]
    fn test_config_display() {
        let err = BpeError::Config(ConfigError::UnknownSearchMethod("nelder".to_string()));
        let msg = format!("{}", err);
        assert!(msg.contains("Configuration error"));
        assert!(msg.contains("nelder"));
    }

    #[test]
    fn test_io_display() {
        let err = BpeError::io("disk full");
        assert_eq!(format!("{}", err), "I/O error: disk full");
    }

    // ========================================
    // Predicate Tests
    // ========================================

    #[test]
    fn test_predicates() {
        let config: BpeError = ConfigError::EmptyParameters.into();
        assert!(config.is_config());
        assert!(!config.is_solver());

        let solver: BpeError = SolverError::DecompositionFailed("svd".to_string()).into();
        assert!(solver.is_solver());
        assert!(!solver.is_persistence());

        assert!(BpeError::serialization("bad toml").is_persistence());
        assert!(BpeError::io("missing").is_persistence());
    }

    // ========================================
    // Conversion Tests
    // ========================================

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: BpeError = io.into();
        assert!(matches!(err, BpeError::Io(ref msg) if msg.contains("no such file")));
    }

    #[test]
    fn test_clone_and_equality() {
        let err = BpeError::serialization("oops");
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_is_std_error() {
        let err = BpeError::io("x");
        let _: &dyn std::error::Error = &err;
    }
}
