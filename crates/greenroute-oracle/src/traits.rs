//! Collaborator seams consumed by the recommendation engine.
//!
//! Implementations must be cheap to share (`Send + Sync`); the engine holds
//! them behind `Arc` and calls them concurrently from a task pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use greenroute_core::CarbonIntensitySample;

use crate::error::OracleResult;

/// Raw catalog entry as delivered by a [`CatalogSource`], before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub code: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Supplies region identity and coordinates.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_regions(&self) -> OracleResult<Vec<RegionRecord>>;
}

/// Answers "is capability C offered in region R".
#[async_trait]
pub trait AvailabilityOracle: Send + Sync {
    async fn check(&self, region_code: &str, capability: &str) -> OracleResult<bool>;
}

/// Reports the carbon intensity of a region's electricity in kgCO2e/kWh.
#[async_trait]
pub trait IntensityOracle: Send + Sync {
    async fn fetch(&self, region_code: &str) -> OracleResult<CarbonIntensitySample>;
}
