use thiserror::Error;

use greenroute_core::CoreError;
use greenroute_oracle::CatalogError;

use crate::fanout::Cancelled;

pub type EngineResult<T> = Result<T, EngineError>;

/// Request-level failures. Per-region oracle failures never appear here;
/// they end up as diagnostics on the result.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Invalid(#[from] CoreError),

    #[error("region catalog unavailable: {0}")]
    CatalogUnavailable(#[from] CatalogError),

    #[error("request cancelled")]
    Cancelled,
}

impl From<Cancelled> for EngineError {
    fn from(_: Cancelled) -> Self {
        EngineError::Cancelled
    }
}
