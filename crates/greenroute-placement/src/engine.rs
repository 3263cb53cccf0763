//! Recommendation engine: the proximity → availability → scoring → ranking
//! funnel.
//!
//! Each stage only narrows the candidate set. Oracle failures are settled
//! locally (fail-closed at the gate, exclusion at scoring) and recorded as
//! diagnostics; only an invalid request, a missing catalog, or cancellation
//! fail the request as a whole.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use greenroute_core::config::GreenrouteConfig;
use greenroute_core::{CapabilitySet, ConfigError, Coordinate, CoreError, Region, distance_km};
use greenroute_oracle::{AvailabilityOracle, CatalogError, IntensityOracle, RegionCatalog, RegionList};

use crate::error::{EngineError, EngineResult};
use crate::fanout::{CancelHandle, FanOut};
use crate::gate::{AvailabilityGate, UnavailableReason};
use crate::result::{
    Diagnostic, EmptyReason, NearbyRegion, PipelineStage, Recommendation, RecommendationResult, ScoredRegion,
    StageCounts, rank_regions,
};
use crate::scorer::{ScoringWeights, SustainabilityScorer};

/// One recommendation request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendRequest {
    pub user_location: Coordinate,
    pub required_capabilities: CapabilitySet,
    pub max_distance_km: f64,
    /// Restrict to these region codes; `None` means every catalog region.
    pub candidate_regions: Option<BTreeSet<String>>,
    /// Overrides the engine's default weight for this request.
    pub weight_market: Option<f64>,
}

impl RecommendRequest {
    pub fn new(user_location: Coordinate, max_distance_km: f64) -> Self {
        Self {
            user_location,
            required_capabilities: CapabilitySet::new(),
            max_distance_km,
            candidate_regions: None,
            weight_market: None,
        }
    }

    pub fn with_capabilities(mut self, required: CapabilitySet) -> Self {
        self.required_capabilities = required;
        self
    }

    pub fn with_candidates<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidate_regions = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_weight_market(mut self, weight: f64) -> Self {
        self.weight_market = Some(weight);
        self
    }
}

fn validate_distance(max_distance_km: f64) -> Result<(), CoreError> {
    if !max_distance_km.is_finite() || max_distance_km < 0.0 {
        return Err(CoreError::InvalidDistance(max_distance_km));
    }
    Ok(())
}

/// A candidate that passed the proximity filter.
struct InRange {
    region: Arc<Region>,
    distance_km: f64,
}

/// Ranks regions for a workload.
///
/// Cheap to share behind an `Arc`; the only state that outlives a request is
/// the memoized catalog inside [`RegionCatalog`].
pub struct RecommendationEngine {
    catalog: Arc<RegionCatalog>,
    gate: AvailabilityGate,
    scorer: SustainabilityScorer,
    weights: ScoringWeights,
    /// Bound on a single catalog load, shared with the fan-out calls.
    call_timeout: Duration,
}

impl RecommendationEngine {
    pub fn new(
        catalog: Arc<RegionCatalog>,
        availability: Arc<dyn AvailabilityOracle>,
        intensity: Arc<dyn IntensityOracle>,
        fanout: FanOut,
    ) -> Self {
        Self {
            catalog,
            gate: AvailabilityGate::new(availability, fanout),
            scorer: SustainabilityScorer::new(intensity, fanout),
            weights: ScoringWeights::default(),
            call_timeout: fanout.call_timeout(),
        }
    }

    /// Build an engine with fan-out and weighting taken from configuration.
    pub fn from_config(
        catalog: Arc<RegionCatalog>,
        availability: Arc<dyn AvailabilityOracle>,
        intensity: Arc<dyn IntensityOracle>,
        config: &GreenrouteConfig,
    ) -> Result<Self, ConfigError> {
        let fanout = FanOut::new(config.engine.max_concurrency, config.engine.call_timeout()?);
        let weights = ScoringWeights::new(config.scoring.weight_market)
            .map_err(|e| ConfigError::Invalid(format!("scoring.weight_market: {e}")))?;
        Ok(Self::new(catalog, availability, intensity, fanout).with_weights(weights))
    }

    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn catalog(&self) -> &Arc<RegionCatalog> {
        &self.catalog
    }

    /// Run the full pipeline for one request.
    pub async fn recommend(
        &self,
        request: &RecommendRequest,
        cancel: Option<CancelHandle>,
    ) -> EngineResult<Recommendation> {
        validate_distance(request.max_distance_km)?;
        let weights = match request.weight_market {
            Some(w) => ScoringWeights::new(w)?,
            None => self.weights,
        };
        let cancel = cancel.as_ref();
        if cancel.is_some_and(CancelHandle::is_cancelled) {
            return Err(EngineError::Cancelled);
        }

        let mut stage = PipelineStage::Initialized;
        let mut result = RecommendationResult::default();

        let regions = self.load_catalog(cancel).await?;

        // Initialized → ProximityFiltered
        let candidates = self.resolve_candidates(&regions, request.candidate_regions.as_ref(), &mut result);
        result.counts.considered = candidates.len();
        let in_range: BTreeMap<String, InRange> = candidates
            .into_iter()
            .filter_map(|region| {
                let distance_km = distance_km(request.user_location, region.location);
                (distance_km <= request.max_distance_km).then(|| (region.code.clone(), InRange { region, distance_km }))
            })
            .collect();
        result.counts.within_distance = in_range.len();
        stage = advance(stage, PipelineStage::ProximityFiltered, &result.counts);
        if in_range.is_empty() {
            return Ok(empty(EmptyReason::NoRegionsWithinDistance, result));
        }

        // ProximityFiltered → AvailabilityFiltered
        let codes: Vec<String> = in_range.keys().cloned().collect();
        let outcomes = self
            .gate
            .evaluate(&codes, &request.required_capabilities, cancel)
            .await?;
        let mut available = Vec::with_capacity(outcomes.len());
        for (code, outcome) in outcomes {
            if outcome.satisfied() {
                available.push(code);
            } else {
                let missing = outcome
                    .missing()
                    .map(|v| {
                        let reason = v.reason.clone().unwrap_or(UnavailableReason::NotOffered);
                        (v.capability.clone(), reason)
                    })
                    .collect();
                result.diagnostics.push(Diagnostic::CapabilitiesUnavailable { code, missing });
            }
        }
        result.counts.satisfying_capabilities = available.len();
        stage = advance(stage, PipelineStage::AvailabilityFiltered, &result.counts);
        if available.is_empty() {
            return Ok(empty(EmptyReason::NoRegionsSatisfyCapabilities, result));
        }

        // AvailabilityFiltered → Scored
        let scores = self.scorer.score_all(&available, &weights, cancel).await?;
        let mut scored = Vec::with_capacity(scores.len());
        for (code, outcome) in scores {
            match (outcome, in_range.get(&code)) {
                (Ok(score), Some(candidate)) => scored.push(ScoredRegion {
                    name: candidate.region.name.clone(),
                    distance_km: candidate.distance_km,
                    location_based: score.location_based,
                    market_based: score.market_based,
                    score: score.score,
                    code,
                }),
                (Err(reason), _) => result.diagnostics.push(Diagnostic::ScoringFailed { code, reason }),
                (Ok(_), None) => {}
            }
        }
        result.counts.scored = scored.len();
        stage = advance(stage, PipelineStage::Scored, &result.counts);
        if scored.is_empty() {
            return Ok(empty(EmptyReason::NoRegionsScoreable, result));
        }

        // Scored → Ranked
        result.ranked = rank_regions(scored);
        advance(stage, PipelineStage::Ranked, &result.counts);
        if let Some(best) = result.best() {
            info!(region = %best.code, score = best.score, distance_km = best.distance_km, "recommendation ranked");
        }
        Ok(Recommendation::Ranked(result))
    }

    /// Catalog regions within `max_distance_km` of the user, nearest first.
    /// Equal distances are ordered by region code.
    pub async fn list_nearby(&self, user_location: Coordinate, max_distance_km: f64) -> EngineResult<Vec<NearbyRegion>> {
        validate_distance(max_distance_km)?;
        let regions = self.fetch_catalog().await?;
        let mut nearby: Vec<NearbyRegion> = regions
            .iter()
            .filter_map(|region| {
                let distance_km = distance_km(user_location, region.location);
                (distance_km <= max_distance_km).then(|| NearbyRegion {
                    code: region.code.clone(),
                    name: region.name.clone(),
                    distance_km,
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km).then_with(|| a.code.cmp(&b.code)));
        debug!(total = regions.len(), nearby = nearby.len(), max_distance_km, "listed nearby regions");
        Ok(nearby)
    }

    async fn load_catalog(&self, cancel: Option<&CancelHandle>) -> EngineResult<RegionList> {
        let regions = match cancel {
            Some(handle) => tokio::select! {
                biased;
                _ = handle.cancelled() => return Err(EngineError::Cancelled),
                loaded = self.fetch_catalog() => loaded?,
            },
            None => self.fetch_catalog().await?,
        };
        Ok(regions)
    }

    /// A catalog load bounded by the per-call timeout. A timed-out load
    /// leaves the catalog unset so the next request tries again.
    async fn fetch_catalog(&self) -> EngineResult<RegionList> {
        match tokio::time::timeout(self.call_timeout, self.catalog.list_regions()).await {
            Ok(loaded) => Ok(loaded?),
            Err(_) => {
                warn!(timeout = ?self.call_timeout, "catalog load timed out");
                Err(CatalogError::TimedOut(self.call_timeout).into())
            }
        }
    }

    /// The caller's candidate codes resolved against the catalog, or the
    /// whole catalog. Unknown codes are recorded and skipped.
    fn resolve_candidates(
        &self,
        regions: &RegionList,
        requested: Option<&BTreeSet<String>>,
        result: &mut RecommendationResult,
    ) -> Vec<Arc<Region>> {
        let Some(requested) = requested else {
            return regions.to_vec();
        };
        let by_code: BTreeMap<&str, &Arc<Region>> = regions.iter().map(|r| (r.code.as_str(), r)).collect();
        let mut resolved = Vec::with_capacity(requested.len());
        for code in requested {
            match by_code.get(code.as_str()) {
                Some(region) => resolved.push(Arc::clone(region)),
                None => {
                    debug!(region = %code, "candidate not in catalog");
                    result.diagnostics.push(Diagnostic::UnknownCandidate { code: code.clone() });
                }
            }
        }
        resolved
    }
}

fn advance(from: PipelineStage, to: PipelineStage, counts: &StageCounts) -> PipelineStage {
    debug_assert!(from < to);
    info!(
        stage = %to,
        considered = counts.considered,
        within_distance = counts.within_distance,
        satisfying_capabilities = counts.satisfying_capabilities,
        scored = counts.scored,
        "pipeline stage complete"
    );
    to
}

fn empty(reason: EmptyReason, result: RecommendationResult) -> Recommendation {
    info!(%reason, diagnostics = result.diagnostics.len(), "no region to recommend");
    Recommendation::Empty { reason, result }
}
