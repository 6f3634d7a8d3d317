//! CLI error type.

use bpe_core::types::ConfigError;
use bpe_optimiser::BpeError;
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Input file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Bad command line value.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Settings or options rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Estimation or persistence failed.
    #[error(transparent)]
    Estimation(#[from] BpeError),
}

/// Result alias for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
