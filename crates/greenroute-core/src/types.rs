//! Shared types used across greenroute crates.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// A point on the globe in decimal degrees.
///
/// Only constructible through [`Coordinate::new`], which rejects
/// non-finite and out-of-range values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> CoreResult<Self> {
        let invalid = |reason| CoreError::InvalidCoordinate {
            latitude,
            longitude,
            reason,
        };
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(invalid("not a finite number"));
        }
        if latitude.abs() > 90.0 {
            return Err(invalid("latitude outside [-90, 90]"));
        }
        if longitude.abs() > 180.0 {
            return Err(invalid("longitude outside [-180, 180]"));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            latitude: f64,
            longitude: f64,
        }
        let raw = Raw::deserialize(deserializer)?;
        Coordinate::new(raw.latitude, raw.longitude).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// A deployable region offered by the cloud catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Opaque unique identifier, e.g. `eu-west-2`.
    pub code: String,
    /// Human-readable label, e.g. `London`.
    pub name: String,
    pub location: Coordinate,
}

impl Region {
    pub fn new(code: impl Into<String>, name: impl Into<String>, location: Coordinate) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            location,
        }
    }
}

/// A normalized capability token, e.g. `compute`, `ec2 g6.4xlarge`, `rds aurora`.
///
/// Normalization trims, lowercases and collapses internal whitespace, so
/// `" RDS   Aurora "` and `"rds aurora"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CapabilityRequest(String);

impl CapabilityRequest {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let normalized = raw
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        if normalized.is_empty() {
            return Err(CoreError::InvalidCapability(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first word of the token (`rds` for `rds aurora`).
    pub fn family(&self) -> &str {
        self.0.split(' ').next().unwrap_or(&self.0)
    }

    /// Everything after the family, if the token names a variant.
    pub fn variant(&self) -> Option<&str> {
        self.0.split_once(' ').map(|(_, variant)| variant)
    }
}

impl<'de> Deserialize<'de> for CapabilityRequest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CapabilityRequest::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for CapabilityRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of capabilities a workload needs. Duplicates collapse.
pub type CapabilitySet = BTreeSet<CapabilityRequest>;

/// Parse raw capability tokens into a normalized set.
pub fn capability_set<I, S>(raw: I) -> CoreResult<CapabilitySet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .map(|token| CapabilityRequest::parse(token.as_ref()))
        .collect()
}

/// Carbon intensity of a region's electricity, in kgCO2e/kWh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbonIntensitySample {
    /// Grid-average emission factor.
    pub location_based: f64,
    /// Procurement-adjusted emission factor.
    pub market_based: f64,
}

impl CarbonIntensitySample {
    pub fn new(location_based: f64, market_based: f64) -> CoreResult<Self> {
        let sample = Self {
            location_based,
            market_based,
        };
        sample.validate()?;
        Ok(sample)
    }

    /// Both values must be finite and non-negative.
    pub fn validate(&self) -> CoreResult<()> {
        for (label, value) in [
            ("location-based", self.location_based),
            ("market-based", self.market_based),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidIntensity(format!(
                    "{label} intensity {value} is not a non-negative number"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_accepts_boundaries() {
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn coordinate_rejects_out_of_range() {
        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(CoreError::InvalidCoordinate { .. })
        ));
        assert!(matches!(
            Coordinate::new(0.0, -180.01),
            Err(CoreError::InvalidCoordinate { .. })
        ));
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn coordinate_deserialize_validates() {
        let ok: Coordinate = serde_json::from_str(r#"{"latitude": 51.5, "longitude": -0.12}"#).unwrap();
        assert_eq!(ok.latitude(), 51.5);

        let bad = serde_json::from_str::<Coordinate>(r#"{"latitude": 151.5, "longitude": 0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn capability_normalizes_case_and_whitespace() {
        let a = CapabilityRequest::parse("  RDS   Aurora ").unwrap();
        let b = CapabilityRequest::parse("rds aurora").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.family(), "rds");
        assert_eq!(a.variant(), Some("aurora"));
    }

    #[test]
    fn capability_rejects_blank() {
        assert!(matches!(
            CapabilityRequest::parse("   "),
            Err(CoreError::InvalidCapability(_))
        ));
    }

    #[test]
    fn capability_set_collapses_duplicates() {
        let set = capability_set(["compute", "Compute ", "object-storage"]).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn intensity_rejects_negative() {
        assert!(CarbonIntensitySample::new(0.3, 0.1).is_ok());
        assert!(CarbonIntensitySample::new(-0.1, 0.1).is_err());
        assert!(CarbonIntensitySample::new(0.1, f64::INFINITY).is_err());
    }
}
