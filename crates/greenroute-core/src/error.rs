//! Input validation errors shared by all greenroute crates.

use thiserror::Error;

/// Result type alias for validated constructors.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised when caller-supplied input is malformed.
///
/// These are always detected before any pipeline stage runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("invalid coordinate ({latitude}, {longitude}): {reason}")]
    InvalidCoordinate {
        latitude: f64,
        longitude: f64,
        reason: &'static str,
    },

    #[error("invalid capability token: {0:?}")]
    InvalidCapability(String),

    #[error("market weight must be within [0, 1], got {0}")]
    InvalidWeight(f64),

    #[error("maximum distance must be a finite non-negative number of km, got {0}")]
    InvalidDistance(f64),

    #[error("invalid carbon intensity sample: {0}")]
    InvalidIntensity(String),
}

/// Errors raised while loading or validating `greenroute.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
