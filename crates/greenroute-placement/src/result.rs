//! Recommendation outcome types and the final ranking step.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use greenroute_core::CapabilityRequest;

use crate::gate::UnavailableReason;
use crate::scorer::ScoringFailure;

/// A region that survived every stage, with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRegion {
    pub code: String,
    pub name: String,
    pub distance_km: f64,
    pub location_based: f64,
    pub market_based: f64,
    /// Lower is better.
    pub score: f64,
}

/// How many candidates were still in play after each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub considered: usize,
    pub within_distance: usize,
    pub satisfying_capabilities: usize,
    pub scored: usize,
}

/// Why a region was dropped, or what went wrong while evaluating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    UnknownCandidate {
        code: String,
    },
    CapabilitiesUnavailable {
        code: String,
        missing: Vec<(CapabilityRequest, UnavailableReason)>,
    },
    ScoringFailed {
        code: String,
        reason: ScoringFailure,
    },
}

impl Diagnostic {
    pub fn region_code(&self) -> &str {
        match self {
            Diagnostic::UnknownCandidate { code }
            | Diagnostic::CapabilitiesUnavailable { code, .. }
            | Diagnostic::ScoringFailed { code, .. } => code,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnknownCandidate { code } => write!(f, "{code}: not in catalog"),
            Diagnostic::CapabilitiesUnavailable { code, missing } => {
                write!(f, "{code}: missing ")?;
                for (i, (capability, reason)) in missing.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{capability} ({reason})")?;
                }
                Ok(())
            }
            Diagnostic::ScoringFailed { code, reason } => write!(f, "{code}: not scored, {reason}"),
        }
    }
}

/// Pipeline states, in order. A request moves strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Initialized,
    ProximityFiltered,
    AvailabilityFiltered,
    Scored,
    Ranked,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStage::Initialized => "initialized",
            PipelineStage::ProximityFiltered => "proximity_filtered",
            PipelineStage::AvailabilityFiltered => "availability_filtered",
            PipelineStage::Scored => "scored",
            PipelineStage::Ranked => "ranked",
        };
        f.write_str(s)
    }
}

/// Everything a request produced, whether or not anything was ranked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    /// Best first.
    pub ranked: Vec<ScoredRegion>,
    pub counts: StageCounts,
    pub diagnostics: Vec<Diagnostic>,
}

impl RecommendationResult {
    pub fn best(&self) -> Option<&ScoredRegion> {
        self.ranked.first()
    }

    /// Percentage by which the cleanest ranked region's location-based
    /// intensity undercuts the dirtiest one's. `None` with nothing ranked or
    /// when every ranked region reports zero.
    pub fn emission_reduction_percent(&self) -> Option<f64> {
        let mut intensities = self.ranked.iter().map(|r| r.location_based);
        let first = intensities.next()?;
        let (lowest, highest) = intensities.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if highest <= 0.0 {
            return None;
        }
        Some((highest - lowest) / highest * 100.0)
    }

    /// Missing capabilities per gated-out region, in region order.
    pub fn unavailable_capabilities(
        &self,
    ) -> impl Iterator<Item = (&str, &[(CapabilityRequest, UnavailableReason)])> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::CapabilitiesUnavailable { code, missing } => Some((code.as_str(), missing.as_slice())),
            _ => None,
        })
    }
}

/// Why a request ended with nothing ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    NoRegionsWithinDistance,
    NoRegionsSatisfyCapabilities,
    NoRegionsScoreable,
}

impl EmptyReason {
    /// The last stage the request reached before running dry.
    pub fn stage(&self) -> PipelineStage {
        match self {
            EmptyReason::NoRegionsWithinDistance => PipelineStage::ProximityFiltered,
            EmptyReason::NoRegionsSatisfyCapabilities => PipelineStage::AvailabilityFiltered,
            EmptyReason::NoRegionsScoreable => PipelineStage::Scored,
        }
    }
}

impl fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EmptyReason::NoRegionsWithinDistance => "no regions within the maximum distance",
            EmptyReason::NoRegionsSatisfyCapabilities => "no regions offer every required capability",
            EmptyReason::NoRegionsScoreable => "no remaining region could be scored",
        };
        f.write_str(s)
    }
}

/// Outcome of a recommendation request. An empty outcome is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Recommendation {
    Ranked(RecommendationResult),
    Empty {
        reason: EmptyReason,
        result: RecommendationResult,
    },
}

impl Recommendation {
    pub fn result(&self) -> &RecommendationResult {
        match self {
            Recommendation::Ranked(result) => result,
            Recommendation::Empty { result, .. } => result,
        }
    }

    pub fn into_result(self) -> RecommendationResult {
        match self {
            Recommendation::Ranked(result) => result,
            Recommendation::Empty { result, .. } => result,
        }
    }

    pub fn best(&self) -> Option<&ScoredRegion> {
        self.result().best()
    }

    pub fn empty_reason(&self) -> Option<EmptyReason> {
        match self {
            Recommendation::Ranked(_) => None,
            Recommendation::Empty { reason, .. } => Some(*reason),
        }
    }

    pub fn final_stage(&self) -> PipelineStage {
        match self {
            Recommendation::Ranked(_) => PipelineStage::Ranked,
            Recommendation::Empty { reason, .. } => reason.stage(),
        }
    }
}

/// A catalog region within range of the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyRegion {
    pub code: String,
    pub name: String,
    pub distance_km: f64,
}

/// Ascending score, then ascending region code.
pub fn compare_scored(a: &ScoredRegion, b: &ScoredRegion) -> Ordering {
    a.score.total_cmp(&b.score).then_with(|| a.code.cmp(&b.code))
}

/// Sort best first. The order is total, so ranking is idempotent and
/// independent of input order.
pub fn rank_regions(mut regions: Vec<ScoredRegion>) -> Vec<ScoredRegion> {
    regions.sort_by(compare_scored);
    regions
}
