//! Verbosity level consulted by the estimator components.
//!
//! The level is an integer in `0..=10`; higher means more output. Components
//! compare it against the named thresholds below before emitting a `tracing`
//! event, so the level decides *what* is produced while the installed
//! subscriber decides *where* it goes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Estimator verbosity, validated to `0..=10`.
///
/// # Examples
/// ```
/// use bpe_core::types::Verbosity;
///
/// let v = Verbosity::new(5).unwrap();
/// assert!(v.allows(Verbosity::SUMMARY));
/// assert!(!v.allows(Verbosity::TRIAL));
/// assert!(Verbosity::new(11).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Verbosity(u8);

impl Verbosity {
    /// Phase banners.
    pub const BANNER: u8 = 2;
    /// Convergence reasons and parameter/cost summaries.
    pub const SUMMARY: u8 = 5;
    /// Evaluation counts and initial diagnostics.
    pub const DETAIL: u8 = 6;
    /// Per-trial diagnostics inside the trust-region search.
    pub const TRIAL: u8 = 8;
    /// Highest accepted level.
    pub const MAX: u8 = 10;

    /// Nothing is emitted.
    pub const SILENT: Verbosity = Verbosity(0);

    /// Create a validated verbosity level.
    pub fn new(level: i64) -> Result<Self, ConfigError> {
        if (0..=i64::from(Self::MAX)).contains(&level) {
            Ok(Self(level as u8))
        } else {
            Err(ConfigError::InvalidVerbosity(level))
        }
    }

    /// Raw level.
    pub fn level(self) -> u8 {
        self.0
    }

    /// Whether output gated at `threshold` should be emitted.
    #[inline]
    pub fn allows(self, threshold: u8) -> bool {
        self.0 >= threshold
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl TryFrom<i64> for Verbosity {
    type Error = ConfigError;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<Verbosity> for i64 {
    fn from(v: Verbosity) -> Self {
        i64::from(v.0)
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
