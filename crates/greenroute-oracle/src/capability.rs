//! Table-driven capability availability.
//!
//! Offerings are declared per region as capability tokens. A token ending
//! in the `*` variant (e.g. `rds *`) offers every variant of that family
//! as well as the bare family itself.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tracing::debug;

use greenroute_core::CapabilityRequest;
use greenroute_core::config::CapabilitiesConfig;

use crate::error::{OracleError, OracleResult};
use crate::traits::AvailabilityOracle;

const WILDCARD: &str = "*";

/// Offerings of a single region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Offerings {
    exact: BTreeSet<String>,
    families: BTreeSet<String>,
}

impl Offerings {
    fn from_tokens(tokens: &[CapabilityRequest]) -> Self {
        let mut offerings = Self::default();
        for token in tokens {
            match token.variant() {
                Some(WILDCARD) => {
                    offerings.families.insert(token.family().to_string());
                }
                _ => {
                    offerings.exact.insert(token.as_str().to_string());
                }
            }
        }
        offerings
    }

    fn offers(&self, capability: &CapabilityRequest) -> bool {
        self.exact.contains(capability.as_str()) || self.families.contains(capability.family())
    }
}

/// Availability oracle backed by a static offering table.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    regions: BTreeMap<String, Offerings>,
    default: Option<Offerings>,
}

impl CapabilityTable {
    pub fn from_config(config: &CapabilitiesConfig) -> Self {
        Self {
            regions: config
                .regions
                .iter()
                .map(|(code, tokens)| (code.clone(), Offerings::from_tokens(tokens)))
                .collect(),
            default: config.default.as_deref().map(Offerings::from_tokens),
        }
    }

    /// Declare the offerings of one region, replacing any previous entry.
    pub fn with_region(mut self, code: &str, tokens: &[CapabilityRequest]) -> Self {
        self.regions.insert(code.to_string(), Offerings::from_tokens(tokens));
        self
    }

    /// Offerings applied to regions without an explicit entry.
    pub fn with_default(mut self, tokens: &[CapabilityRequest]) -> Self {
        self.default = Some(Offerings::from_tokens(tokens));
        self
    }

    fn offerings(&self, region_code: &str) -> Option<&Offerings> {
        self.regions.get(region_code).or(self.default.as_ref())
    }
}

#[async_trait]
impl AvailabilityOracle for CapabilityTable {
    async fn check(&self, region_code: &str, capability: &str) -> OracleResult<bool> {
        let capability = CapabilityRequest::parse(capability)?;
        let offerings = self
            .offerings(region_code)
            .ok_or_else(|| OracleError::UnknownRegion(region_code.to_string()))?;
        let offered = offerings.offers(&capability);
        debug!(region = region_code, %capability, offered, "capability table lookup");
        Ok(offered)
    }
}
