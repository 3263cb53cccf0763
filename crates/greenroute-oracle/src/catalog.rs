//! Region catalog: a validated, memoized view over a [`CatalogSource`].
//!
//! The first `list_regions` call fetches and validates the catalog; every
//! later call (including concurrent ones racing the first) reads the same
//! immutable snapshot. A failed fetch is not memoized.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use greenroute_core::{Coordinate, Region};

use crate::error::{CatalogError, OracleError, OracleResult};
use crate::traits::{CatalogSource, RegionRecord};

/// Shared, immutable catalog snapshot.
pub type RegionList = Arc<[Arc<Region>]>;

/// Injectable catalog handle with one-time initialization.
pub struct RegionCatalog {
    source: Arc<dyn CatalogSource>,
    regions: OnceCell<RegionList>,
}

impl RegionCatalog {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            regions: OnceCell::new(),
        }
    }

    /// All known regions, in the order the source reported them.
    pub async fn list_regions(&self) -> Result<RegionList, CatalogError> {
        self.regions
            .get_or_try_init(|| self.load())
            .await
            .cloned()
    }

    /// Whether the snapshot has been populated.
    pub fn is_loaded(&self) -> bool {
        self.regions.initialized()
    }

    async fn load(&self) -> Result<RegionList, CatalogError> {
        let records = self.source.list_regions().await.map_err(|e| {
            warn!(error = %e, "region catalog fetch failed");
            CatalogError::Source(e)
        })?;
        let regions = validate_records(records)?;
        info!(regions = regions.len(), "region catalog loaded");
        Ok(regions)
    }
}

fn validate_records(records: Vec<RegionRecord>) -> Result<RegionList, CatalogError> {
    if records.is_empty() {
        return Err(CatalogError::Empty);
    }

    let mut seen = HashSet::new();
    let mut regions = Vec::with_capacity(records.len());
    for record in records {
        let code = record.code.trim().to_string();
        if code.is_empty() {
            return Err(CatalogError::InvalidRecord {
                code: record.code,
                reason: "empty region code".into(),
            });
        }
        if !seen.insert(code.clone()) {
            return Err(CatalogError::DuplicateCode(code));
        }
        let location = Coordinate::new(record.latitude, record.longitude).map_err(|e| {
            CatalogError::InvalidRecord {
                code: code.clone(),
                reason: e.to_string(),
            }
        })?;
        let name = if record.name.trim().is_empty() {
            code.clone()
        } else {
            record.name
        };
        debug!(region = %code, %location, "catalog region");
        regions.push(Arc::new(Region::new(code, name, location)));
    }
    Ok(regions.into())
}

/// (code, display name, latitude, longitude)
const BUILTIN_REGIONS: &[(&str, &str, f64, f64)] = &[
    ("us-east-1", "N. Virginia", 39.0438, -77.4874),
    ("us-east-2", "Ohio", 39.9612, -82.9988),
    ("us-west-1", "N. California", 37.3541, -121.9552),
    ("us-west-2", "Oregon", 45.8399, -119.7006),
    ("ca-central-1", "Canada Central", 45.5017, -73.5673),
    ("sa-east-1", "São Paulo", -23.5505, -46.6333),
    ("eu-west-1", "Ireland", 53.3498, -6.2603),
    ("eu-west-2", "London", 51.5074, -0.1278),
    ("eu-west-3", "Paris", 48.8566, 2.3522),
    ("eu-central-1", "Frankfurt", 50.1109, 8.6821),
    ("eu-north-1", "Stockholm", 59.3293, 18.0686),
    ("eu-south-1", "Milan", 45.4642, 9.1900),
    ("me-south-1", "Bahrain", 26.0667, 50.5577),
    ("af-south-1", "Cape Town", -33.9249, 18.4241),
    ("ap-south-1", "Mumbai", 19.0760, 72.8777),
    ("ap-south-2", "Hyderabad", 17.3850, 78.4867),
    ("ap-southeast-1", "Singapore", 1.3521, 103.8198),
    ("ap-southeast-2", "Sydney", -33.8688, 151.2093),
    ("ap-northeast-1", "Tokyo", 35.6762, 139.6503),
    ("ap-northeast-2", "Seoul", 37.5665, 126.9780),
    ("ap-northeast-3", "Osaka", 34.6937, 135.5023),
    ("ap-east-1", "Hong Kong", 22.3193, 114.1694),
];

/// The AWS commercial regions with approximate metro coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCatalog;

#[async_trait]
impl CatalogSource for BuiltinCatalog {
    async fn list_regions(&self) -> OracleResult<Vec<RegionRecord>> {
        Ok(BUILTIN_REGIONS
            .iter()
            .map(|&(code, name, latitude, longitude)| RegionRecord {
                code: code.to_string(),
                name: name.to_string(),
                latitude,
                longitude,
            })
            .collect())
    }
}

/// Catalog read from a TOML file of `[[regions]]` tables.
#[derive(Debug, Clone)]
pub struct FileCatalog {
    path: PathBuf,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    regions: Vec<RegionRecord>,
}

impl FileCatalog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CatalogSource for FileCatalog {
    async fn list_regions(&self) -> OracleResult<Vec<RegionRecord>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            OracleError::Unavailable(format!("read {}: {e}", self.path.display()))
        })?;
        let file: CatalogFile = toml::from_str(&content).map_err(|e| {
            OracleError::InvalidResponse(format!("parse {}: {e}", self.path.display()))
        })?;
        Ok(file.regions)
    }
}
