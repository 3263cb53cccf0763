//! Oracle and catalog error types.

use std::time::Duration;

use thiserror::Error;

use greenroute_core::CoreError;

/// Result type alias for a single oracle call.
pub type OracleResult<T> = Result<T, OracleError>;

/// Failure of a single external lookup.
///
/// The engine never propagates these; each one becomes a fail-closed
/// verdict or a scoring exclusion for the affected region.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    #[error("region not known to oracle: {0}")]
    UnknownRegion(String),

    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed oracle response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

/// The region catalog could not be produced. Always fatal to a request.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("catalog source failed: {0}")]
    Source(#[from] OracleError),

    #[error("catalog source did not answer within {0:?}")]
    TimedOut(Duration),

    #[error("catalog source returned no regions")]
    Empty,

    #[error("catalog entry {code}: {reason}")]
    InvalidRecord { code: String, reason: String },

    #[error("catalog lists region {0} more than once")]
    DuplicateCode(String),
}
