//! Builds the engine and its oracles from `greenroute.toml`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use tracing::{debug, info};

use greenroute_core::GreenrouteConfig;
use greenroute_core::config::IntensityProvider;
use greenroute_oracle::{
    BuiltinCatalog, CachedIntensityOracle, CapabilityTable, CatalogSource, ElectricityMapsOracle, FileCatalog,
    IntensityOracle, RegionCatalog, StaticIntensityTable,
};
use greenroute_placement::RecommendationEngine;

pub const DEFAULT_CONFIG_FILE: &str = "greenroute.toml";

/// Load the explicit config file, else `./greenroute.toml` if present, else
/// defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<GreenrouteConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
        None => {
            debug!("no config file, using defaults");
            return Ok(GreenrouteConfig::default());
        }
    };
    let config = GreenrouteConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

pub fn build_catalog(config: &GreenrouteConfig) -> Arc<RegionCatalog> {
    let source: Arc<dyn CatalogSource> = match &config.catalog.path {
        Some(path) => Arc::new(FileCatalog::new(path)),
        None => Arc::new(BuiltinCatalog),
    };
    Arc::new(RegionCatalog::new(source))
}

pub fn build_intensity(config: &GreenrouteConfig) -> anyhow::Result<Arc<dyn IntensityOracle>> {
    let intensity = &config.intensity;
    let oracle: Arc<dyn IntensityOracle> = match intensity.provider {
        IntensityProvider::Static => {
            if intensity.samples.is_empty() {
                bail!("intensity provider is static but [intensity.static] lists no samples");
            }
            Arc::new(StaticIntensityTable::new(intensity.samples.clone()))
        }
        IntensityProvider::ElectricityMaps => {
            let Some(token) = intensity.resolve_api_token() else {
                bail!(
                    "intensity provider is electricitymaps but no API token is set (intensity.api_token or ${})",
                    intensity.api_token_env
                );
            };
            Arc::new(ElectricityMapsOracle::new(intensity, token))
        }
    };
    match intensity.cache_ttl()? {
        Some(ttl) => {
            debug!(?ttl, "caching intensity samples");
            Ok(Arc::new(CachedIntensityOracle::new(oracle, ttl)))
        }
        None => Ok(oracle),
    }
}

pub fn build_engine(config: &GreenrouteConfig) -> anyhow::Result<RecommendationEngine> {
    let availability = Arc::new(CapabilityTable::from_config(&config.capabilities));
    let engine = RecommendationEngine::from_config(build_catalog(config), availability, build_intensity(config)?, config)
        .context("invalid engine configuration")?;
    info!(
        provider = ?config.intensity.provider,
        max_concurrency = config.engine.max_concurrency,
        weight_market = engine.weights().market(),
        "engine ready"
    );
    Ok(engine)
}
