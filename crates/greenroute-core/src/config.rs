//! greenroute.toml configuration parser.
//!
//! Every section is optional. Missing sections fall back to the defaults
//! below, so an empty file is a valid configuration that uses the built-in
//! catalog, the shipped AWS service table and the static intensity provider
//! with shipped reference readings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{CapabilityRequest, CarbonIntensitySample};

/// Market weight used when the caller does not supply one.
pub const DEFAULT_WEIGHT_MARKET: f64 = 0.7;

/// Region → ElectricityMaps zone, as shipped.
const DEFAULT_ZONES: &[(&str, &str)] = &[
    ("us-east-1", "US-MIDA-PJM"),
    ("us-east-2", "US-MIDA-PJM"),
    ("us-west-1", "US-CAL-CISO"),
    ("us-west-2", "US-NW-BPAT"),
    ("mx-central-1", "MX"),
    ("eu-west-1", "IE"),
    ("eu-west-2", "GB"),
    ("eu-west-3", "FR"),
    ("eu-central-1", "DE"),
    ("eu-north-1", "SE"),
    ("eu-south-1", "IT"),
    ("cn-north-1", "CN"),
    ("cn-northwest-1", "CN"),
    ("ap-east-1", "HK"),
    ("ap-south-1", "IN-WE"),
    ("ap-south-2", "IN-SO"),
    ("ap-southeast-1", "SG"),
    ("ap-southeast-2", "AU-NSW"),
    ("ap-southeast-3", "ID"),
    ("ap-southeast-4", "AU-VIC"),
    ("ap-southeast-5", "MY-WM"),
    ("ap-southeast-6", "NZ"),
    ("ap-northeast-1", "JP-TK"),
    ("ap-northeast-2", "KR"),
    ("ap-northeast-3", "JP-KN"),
    ("ca-central-1", "CA-QC"),
    ("sa-east-1", "BR-CS"),
    ("me-south-1", "BH"),
    ("af-south-1", "ZA"),
];

/// Services offered by regions without their own entry.
const DEFAULT_SERVICES: &[&str] = &[
    "compute",
    "object-storage",
    "relational-db",
    "ec2",
    "ec2 standard-instances",
    "s3",
    "s3 standard",
    "rds",
    "rds mysql",
    "rds postgres",
    "lambda",
    "lambda standard",
    "ecs",
    "ecs ec2",
    "eks",
    "eks standard",
];

/// Regions whose service catalog differs from [`DEFAULT_SERVICES`].
const REGIONAL_SERVICES: &[(&str, &[&str])] = &[
    (
        "us-east-1",
        &[
            "compute",
            "object-storage",
            "relational-db",
            "gpu",
            "ec2 *",
            "s3 *",
            "rds *",
            "lambda *",
            "redshift *",
            "eks *",
            "ecs *",
        ],
    ),
    (
        "eu-west-1",
        &[
            "compute",
            "object-storage",
            "relational-db",
            "gpu",
            "ec2",
            "ec2 standard-instances",
            "ec2 g6.xlarge",
            "ec2 g6.2xlarge",
            "ec2 g6.4xlarge",
            "ec2 g5.xlarge",
            "ec2 g5.2xlarge",
            "ec2 g5.4xlarge",
            "ec2 g5.8xlarge",
            "s3 *",
            "rds",
            "rds mysql",
            "rds postgres",
            "rds aurora",
            "rds oracle",
            "lambda *",
            "redshift *",
            "eks *",
            "ecs *",
        ],
    ),
    (
        "ap-south-1",
        &[
            "compute",
            "object-storage",
            "relational-db",
            "gpu",
            "ec2",
            "ec2 standard-instances",
            "ec2 g5.xlarge",
            "ec2 g5.2xlarge",
            "s3",
            "s3 standard",
            "s3 glacier",
            "rds",
            "rds mysql",
            "rds postgres",
            "rds aurora",
            "lambda",
            "lambda standard",
            "eks",
            "eks standard",
            "ecs *",
        ],
    ),
    (
        "ap-southeast-1",
        &[
            "compute",
            "object-storage",
            "relational-db",
            "gpu",
            "ec2",
            "ec2 standard-instances",
            "ec2 g5.xlarge",
            "ec2 g5.2xlarge",
            "ec2 g5.4xlarge",
            "s3",
            "s3 standard",
            "rds",
            "rds mysql",
            "rds postgres",
            "rds aurora",
            "lambda",
            "lambda standard",
            "redshift",
            "redshift dc2",
            "redshift ra3",
            "eks",
            "eks standard",
            "ecs *",
        ],
    ),
];

/// Approximate annual grid-average intensity (kgCO2e/kWh) of the built-in
/// regions. Market-based values are derived with the default market factor.
const DEFAULT_LOCATION_INTENSITY: &[(&str, f64)] = &[
    ("us-east-1", 0.379),
    ("us-east-2", 0.410),
    ("us-west-1", 0.200),
    ("us-west-2", 0.120),
    ("ca-central-1", 0.002),
    ("sa-east-1", 0.074),
    ("eu-west-1", 0.290),
    ("eu-west-2", 0.198),
    ("eu-west-3", 0.056),
    ("eu-central-1", 0.381),
    ("eu-north-1", 0.041),
    ("eu-south-1", 0.330),
    ("me-south-1", 0.580),
    ("af-south-1", 0.900),
    ("ap-south-1", 0.710),
    ("ap-south-2", 0.640),
    ("ap-southeast-1", 0.408),
    ("ap-southeast-2", 0.640),
    ("ap-northeast-1", 0.460),
    ("ap-northeast-2", 0.420),
    ("ap-northeast-3", 0.390),
    ("ap-east-1", 0.700),
];

const DEFAULT_MARKET_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenrouteConfig {
    pub engine: EngineConfig,
    pub scoring: ScoringConfig,
    pub catalog: CatalogConfig,
    pub capabilities: CapabilitiesConfig,
    pub intensity: IntensityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on in-flight oracle calls per pipeline stage.
    pub max_concurrency: usize,
    /// Timeout applied to every single oracle call, e.g. "10s".
    pub call_timeout: String,
    /// Distance used by the CLI when `--max-distance` is omitted.
    pub default_max_distance_km: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            call_timeout: "10s".to_string(),
            default_max_distance_km: 5000.0,
        }
    }
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.call_timeout).ok_or_else(|| {
            ConfigError::Invalid(format!("engine.call_timeout: bad duration {:?}", self.call_timeout))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the market-based intensity; location-based gets the rest.
    pub weight_market: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_market: DEFAULT_WEIGHT_MARKET,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// TOML file with `[[regions]]` entries. Built-in catalog when unset.
    pub path: Option<PathBuf>,
}

/// Capability offerings per region.
///
/// A region listed under `regions` offers exactly those tokens. Any other
/// region offers `default`, or fails every check when `default` is unset.
/// A `regions` table in the file replaces the shipped one as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesConfig {
    pub default: Option<Vec<CapabilityRequest>>,
    pub regions: BTreeMap<String, Vec<CapabilityRequest>>,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            default: Some(tokens(DEFAULT_SERVICES)),
            regions: REGIONAL_SERVICES
                .iter()
                .map(|(region, services)| (region.to_string(), tokens(services)))
                .collect(),
        }
    }
}

fn tokens(raw: &[&str]) -> Vec<CapabilityRequest> {
    raw.iter().filter_map(|t| CapabilityRequest::parse(t).ok()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityProvider {
    #[default]
    Static,
    ElectricityMaps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    pub provider: IntensityProvider,
    /// Base URL of the ElectricityMaps v3 API.
    pub endpoint: String,
    /// Inline API token. Takes precedence over `api_token_env`.
    pub api_token: Option<String>,
    /// Environment variable holding the API token.
    pub api_token_env: String,
    /// Divisor converting the provider's unit (g/kWh) into kg/kWh.
    pub grams_per_kilogram: f64,
    /// Market-based intensity as a fraction of the location-based value.
    pub market_factor: f64,
    /// Freshness window for cached samples, e.g. "5m". No caching when unset.
    pub cache_ttl: Option<String>,
    /// Zone used for regions missing from `zones`.
    pub default_zone: String,
    pub zones: BTreeMap<String, String>,
    /// Fixed samples for the static provider, keyed by region code.
    #[serde(rename = "static")]
    pub samples: BTreeMap<String, CarbonIntensitySample>,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            provider: IntensityProvider::Static,
            endpoint: "https://api.electricitymaps.com/v3".to_string(),
            api_token: None,
            api_token_env: "ELECTRICITYMAPS_API_TOKEN".to_string(),
            grams_per_kilogram: 1000.0,
            market_factor: DEFAULT_MARKET_FACTOR,
            cache_ttl: None,
            default_zone: "DE".to_string(),
            zones: DEFAULT_ZONES
                .iter()
                .map(|(region, zone)| (region.to_string(), zone.to_string()))
                .collect(),
            samples: DEFAULT_LOCATION_INTENSITY
                .iter()
                .map(|&(region, location_based)| {
                    let sample = CarbonIntensitySample {
                        location_based,
                        market_based: location_based * DEFAULT_MARKET_FACTOR,
                    };
                    (region.to_string(), sample)
                })
                .collect(),
        }
    }
}

impl IntensityConfig {
    /// The zone for a region, falling back to `default_zone`.
    pub fn zone_for(&self, region_code: &str) -> &str {
        self.zones
            .get(region_code)
            .map(String::as_str)
            .unwrap_or(&self.default_zone)
    }

    pub fn cache_ttl(&self) -> Result<Option<Duration>, ConfigError> {
        self.cache_ttl
            .as_deref()
            .map(|raw| {
                parse_duration(raw).ok_or_else(|| {
                    ConfigError::Invalid(format!("intensity.cache_ttl: bad duration {raw:?}"))
                })
            })
            .transpose()
    }

    /// Resolve the API token from config or the environment.
    pub fn resolve_api_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .or_else(|| std::env::var(&self.api_token_env).ok())
            .filter(|token| !token.trim().is_empty())
    }
}

impl GreenrouteConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GreenrouteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_concurrency == 0 {
            return Err(ConfigError::Invalid("engine.max_concurrency must be at least 1".into()));
        }
        self.engine.call_timeout()?;
        let max = self.engine.default_max_distance_km;
        if !max.is_finite() || max < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "engine.default_max_distance_km must be non-negative, got {max}"
            )));
        }
        let w = self.scoring.weight_market;
        if !(0.0..=1.0).contains(&w) {
            return Err(ConfigError::Invalid(format!(
                "scoring.weight_market must be within [0, 1], got {w}"
            )));
        }
        let intensity = &self.intensity;
        if !(intensity.grams_per_kilogram.is_finite() && intensity.grams_per_kilogram > 0.0) {
            return Err(ConfigError::Invalid(
                "intensity.grams_per_kilogram must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&intensity.market_factor) {
            return Err(ConfigError::Invalid(
                "intensity.market_factor must be within [0, 1]".into(),
            ));
        }
        if intensity.default_zone.trim().is_empty() {
            return Err(ConfigError::Invalid("intensity.default_zone must not be empty".into()));
        }
        if let Some((region, _)) = intensity.zones.iter().find(|(_, zone)| zone.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("intensity.zones.{region} is empty")));
        }
        for (region, sample) in &intensity.samples {
            sample
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("intensity.static.{region}: {e}")))?;
        }
        intensity.cache_ttl()?;
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = GreenrouteConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine.max_concurrency, 8);
        assert_eq!(config.engine.call_timeout().unwrap(), Duration::from_secs(10));
        assert_eq!(config.scoring.weight_market, DEFAULT_WEIGHT_MARKET);
        assert_eq!(config.intensity.provider, IntensityProvider::Static);
        assert!(config.catalog.path.is_none());
    }

    #[test]
    fn shipped_service_table_is_populated() {
        let capabilities = CapabilitiesConfig::default();
        let default = capabilities.default.as_ref().unwrap();
        assert_eq!(default.len(), DEFAULT_SERVICES.len());
        assert!(default.iter().any(|c| c.as_str() == "rds postgres"));

        let mumbai: Vec<_> = capabilities.regions["ap-south-1"].iter().map(|c| c.as_str()).collect();
        assert!(mumbai.contains(&"ec2 g5.2xlarge"));
        assert!(!mumbai.iter().any(|c| c.starts_with("ec2 g6")));
        assert!(capabilities.regions["us-east-1"].iter().any(|c| c.as_str() == "ec2 *"));
    }

    #[test]
    fn shipped_samples_are_valid() {
        let intensity = IntensityConfig::default();
        assert_eq!(intensity.samples.len(), DEFAULT_LOCATION_INTENSITY.len());
        for (region, sample) in &intensity.samples {
            assert!(sample.validate().is_ok(), "{region}");
            assert!(sample.market_based <= sample.location_based, "{region}");
        }
        assert_eq!(intensity.samples["eu-north-1"].location_based, 0.041);
    }

    #[test]
    fn explicit_tables_replace_shipped_ones() {
        let toml_str = r#"
[capabilities.regions]
"eu-west-2" = ["compute"]

[intensity.static]
"eu-west-2" = { location_based = 0.2, market_based = 0.1 }
"#;
        let config = GreenrouteConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.capabilities.regions.len(), 1);
        // `default` was not given, so the shipped default set stays.
        assert!(config.capabilities.default.is_some());
        assert_eq!(config.intensity.samples.len(), 1);
    }

    #[test]
    fn parses_full_file() {
        let toml_str = r#"
[engine]
max_concurrency = 4
call_timeout = "750ms"

[scoring]
weight_market = 0.5

[capabilities]
default = ["compute", "Object-Storage"]

[capabilities.regions]
"eu-west-2" = ["compute", "rds *"]

[intensity]
provider = "electricitymaps"
cache_ttl = "5m"
default_zone = "GB"

[intensity.zones]
"eu-west-2" = "GB"

[intensity.static]
"eu-west-2" = { location_based = 0.2, market_based = 0.1 }
"#;
        let config = GreenrouteConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.engine.call_timeout().unwrap(), Duration::from_millis(750));
        assert_eq!(config.scoring.weight_market, 0.5);
        assert_eq!(config.intensity.provider, IntensityProvider::ElectricityMaps);
        assert_eq!(config.intensity.cache_ttl().unwrap(), Some(Duration::from_secs(300)));

        let default = config.capabilities.default.as_ref().unwrap();
        assert_eq!(default[1].as_str(), "object-storage");
        assert_eq!(config.capabilities.regions["eu-west-2"].len(), 2);

        // An explicit zones table replaces the shipped one.
        assert_eq!(config.intensity.zone_for("eu-west-2"), "GB");
        assert_eq!(config.intensity.zone_for("us-east-1"), "GB");
        assert_eq!(config.intensity.samples["eu-west-2"].market_based, 0.1);
    }

    #[test]
    fn default_zone_table_falls_back() {
        let intensity = IntensityConfig::default();
        assert_eq!(intensity.zone_for("eu-north-1"), "SE");
        assert_eq!(intensity.zone_for("il-central-1"), "DE");
    }

    #[test]
    fn shipped_zones_name_real_grid_zones() {
        let intensity = IntensityConfig::default();
        assert_eq!(intensity.zone_for("us-east-1"), "US-MIDA-PJM");
        assert_eq!(intensity.zone_for("us-east-2"), "US-MIDA-PJM");
        assert_eq!(intensity.zone_for("us-west-1"), "US-CAL-CISO");
        assert_eq!(intensity.zone_for("us-west-2"), "US-NW-BPAT");
        assert_eq!(intensity.zone_for("ap-southeast-4"), "AU-VIC");
        assert_eq!(intensity.zone_for("ap-southeast-5"), "MY-WM");
        assert_eq!(intensity.zone_for("sa-east-1"), "BR-CS");
    }

    #[test]
    fn rejects_weight_out_of_range() {
        let err = GreenrouteConfig::from_toml_str("[scoring]\nweight_market = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = GreenrouteConfig::from_toml_str("[engine]\nmax_concurrency = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = GreenrouteConfig::from_toml_str("[engine]\ncall_timeout = \"soon\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_static_sample() {
        let toml_str = r#"
[intensity.static]
"eu-west-1" = { location_based = -0.2, market_based = 0.1 }
"#;
        assert!(GreenrouteConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn rejects_blank_capability_token() {
        let toml_str = "[capabilities]\ndefault = [\"  \"]\n";
        assert!(matches!(
            GreenrouteConfig::from_toml_str(toml_str),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greenroute.toml");
        std::fs::write(&path, "[scoring]\nweight_market = 0.25\n").unwrap();

        let config = GreenrouteConfig::from_file(&path).unwrap();
        assert_eq!(config.scoring.weight_market, 0.25);

        let missing = GreenrouteConfig::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = GreenrouteConfig::default();
        let rendered = config.to_toml_string().unwrap();
        let parsed = GreenrouteConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.intensity.zones.len(), config.intensity.zones.len());
        assert_eq!(parsed.intensity.samples, config.intensity.samples);
        assert_eq!(parsed.capabilities.regions, config.capabilities.regions);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("ten"), None);
    }
}
