//! Sustainability scoring for candidate regions.
//!
//! Combines the two carbon-accounting measures of a region into one scalar:
//! - **Market-based** intensity, weighted by `ScoringWeights::market`
//! - **Location-based** intensity, weighted by the remainder
//!
//! Lower scores are cleaner. A region whose intensity cannot be fetched
//! has no score at all; it is never given a placeholder value.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use greenroute_core::config::DEFAULT_WEIGHT_MARKET;
use greenroute_core::{CarbonIntensitySample, CoreError, CoreResult, Region};
use greenroute_oracle::{IntensityOracle, OracleError};

use crate::fanout::{CallFailure, CancelHandle, Cancelled, FanOut};

/// Weight of the market-based measure; location-based gets `1 - market`.
///
/// Only constructible through [`ScoringWeights::new`], so the weight is
/// always in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    market: f64,
}

impl ScoringWeights {
    pub fn new(market: f64) -> CoreResult<Self> {
        if !(0.0..=1.0).contains(&market) {
            return Err(CoreError::InvalidWeight(market));
        }
        Ok(Self { market })
    }

    pub fn market(&self) -> f64 {
        self.market
    }

    pub fn location(&self) -> f64 {
        1.0 - self.market
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            market: DEFAULT_WEIGHT_MARKET,
        }
    }
}

/// Intensities and the combined score of one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SustainabilityScore {
    pub location_based: f64,
    pub market_based: f64,
    /// Lower is better.
    pub score: f64,
}

/// Why a region has no score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ScoringFailure {
    /// The intensity oracle call failed.
    OracleError(String),
    /// The oracle answered with a sample that is negative or not finite.
    InvalidSample(String),
    /// The oracle did not answer within the call timeout.
    TimedOut,
    /// The call task died before answering.
    Aborted(String),
}

impl From<CallFailure> for ScoringFailure {
    fn from(failure: CallFailure) -> Self {
        match failure {
            CallFailure::Oracle(OracleError::Invalid(e)) => ScoringFailure::InvalidSample(e.to_string()),
            CallFailure::Oracle(e) => ScoringFailure::OracleError(e.to_string()),
            CallFailure::TimedOut(_) => ScoringFailure::TimedOut,
            CallFailure::Aborted(e) => ScoringFailure::Aborted(e),
        }
    }
}

impl std::fmt::Display for ScoringFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringFailure::OracleError(e) => write!(f, "intensity oracle error: {e}"),
            ScoringFailure::InvalidSample(e) => write!(f, "invalid intensity sample: {e}"),
            ScoringFailure::TimedOut => f.write_str("intensity lookup timed out"),
            ScoringFailure::Aborted(e) => write!(f, "intensity lookup aborted: {e}"),
        }
    }
}

/// A region's score, or why it has none.
pub type ScoreOutcome = Result<SustainabilityScore, ScoringFailure>;

/// `market * w + location * (1 - w)`, unrounded.
pub fn combine(sample: &CarbonIntensitySample, weights: &ScoringWeights) -> SustainabilityScore {
    let score = sample.market_based * weights.market() + sample.location_based * weights.location();
    SustainabilityScore {
        location_based: sample.location_based,
        market_based: sample.market_based,
        score,
    }
}

/// Scores regions against an [`IntensityOracle`].
#[derive(Clone)]
pub struct SustainabilityScorer {
    oracle: Arc<dyn IntensityOracle>,
    fanout: FanOut,
}

impl SustainabilityScorer {
    pub fn new(oracle: Arc<dyn IntensityOracle>, fanout: FanOut) -> Self {
        Self { oracle, fanout }
    }

    /// Score a single region. One oracle call.
    pub async fn score(
        &self,
        region: &Region,
        weights: &ScoringWeights,
        cancel: Option<&CancelHandle>,
    ) -> Result<ScoreOutcome, Cancelled> {
        let mut scores = self
            .score_all(std::slice::from_ref(&region.code), weights, cancel)
            .await?;
        Ok(scores
            .remove(&region.code)
            .unwrap_or_else(|| Err(ScoringFailure::Aborted("no result".to_string()))))
    }

    /// Score many regions with one fanned-out oracle call each.
    ///
    /// Each entry is either the score or the reason the region cannot be
    /// scored.
    pub async fn score_all(
        &self,
        region_codes: &[String],
        weights: &ScoringWeights,
        cancel: Option<&CancelHandle>,
    ) -> Result<BTreeMap<String, ScoreOutcome>, Cancelled> {
        let calls: Vec<_> = region_codes
            .iter()
            .map(|code| {
                let oracle = self.oracle.clone();
                let region = code.clone();
                (code.clone(), async move {
                    let sample = oracle.fetch(&region).await?;
                    sample.validate()?;
                    Ok::<_, OracleError>(sample)
                })
            })
            .collect();

        let results = self.fanout.run(calls, cancel).await?;

        Ok(results
            .into_iter()
            .map(|(code, result)| {
                let scored = match result {
                    Ok(sample) => {
                        let scored = combine(&sample, weights);
                        debug!(
                            region = %code,
                            location_based = scored.location_based,
                            market_based = scored.market_based,
                            score = scored.score,
                            "region scored"
                        );
                        Ok(scored)
                    }
                    Err(failure) => {
                        warn!(region = %code, error = %failure, "intensity lookup failed, excluding region");
                        Err(ScoringFailure::from(failure))
                    }
                };
                (code, scored)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use greenroute_core::Coordinate;
    use greenroute_oracle::{OracleResult, StaticIntensityTable};

    use super::*;

    fn sample(location: f64, market: f64) -> CarbonIntensitySample {
        CarbonIntensitySample::new(location, market).unwrap()
    }

    fn region(code: &str) -> Region {
        Region::new(code, code, Coordinate::new(0.0, 0.0).unwrap())
    }

    fn fanout() -> FanOut {
        FanOut::new(4, Duration::from_secs(5))
    }

    #[test]
    fn combine_matches_weighted_sum() {
        let weights = ScoringWeights::default();
        let s = combine(&sample(0.3, 0.1), &weights);
        assert_eq!(s.score, 0.1 * 0.7 + 0.3 * (1.0 - 0.7));
        assert!((s.score - 0.16).abs() < 1e-12);
    }

    #[test]
    fn combine_exact_for_many_weights() {
        let sample = sample(0.42, 0.17);
        for w in [0.0, 0.25, 0.5, 0.7, 1.0] {
            let weights = ScoringWeights::new(w).unwrap();
            let s = combine(&sample, &weights);
            assert_eq!(s.score, 0.17 * w + 0.42 * (1.0 - w));
        }
    }

    #[test]
    fn extreme_weights_select_one_measure() {
        let sample = sample(0.5, 0.2);
        assert_eq!(combine(&sample, &ScoringWeights::new(1.0).unwrap()).score, 0.2);
        assert_eq!(combine(&sample, &ScoringWeights::new(0.0).unwrap()).score, 0.5);
    }

    #[test]
    fn score_is_monotonic_in_both_intensities() {
        let weights = ScoringWeights::default();
        let base = combine(&sample(0.3, 0.1), &weights).score;
        for (dl, dm) in [(0.1, 0.0), (0.0, 0.1), (0.2, 0.05)] {
            let raised = combine(&sample(0.3 + dl, 0.1 + dm), &weights).score;
            assert!(raised >= base, "raised {raised} < base {base}");
        }
    }

    #[test]
    fn rejects_weight_out_of_range() {
        assert!(matches!(ScoringWeights::new(1.01), Err(CoreError::InvalidWeight(_))));
        assert!(ScoringWeights::new(-0.1).is_err());
        assert!(ScoringWeights::new(f64::NAN).is_err());
    }

    struct CountingOracle {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IntensityOracle for CountingOracle {
        async fn fetch(&self, _region_code: &str) -> OracleResult<CarbonIntensitySample> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CarbonIntensitySample::new(0.2, 0.1)?)
        }
    }

    #[tokio::test]
    async fn one_oracle_call_per_region() {
        let oracle = Arc::new(CountingOracle {
            calls: AtomicUsize::new(0),
        });
        let scorer = SustainabilityScorer::new(oracle.clone(), fanout());
        let scored = scorer
            .score(&region("r1"), &ScoringWeights::default(), None)
            .await
            .unwrap()
            .unwrap();
        assert!((scored.score - (0.1 * 0.7 + 0.2 * 0.3)).abs() < 1e-12);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_lookup_is_an_exclusion_not_a_default() {
        let table = StaticIntensityTable::default().with_sample("r1", sample(0.3, 0.1));
        let scorer = SustainabilityScorer::new(Arc::new(table), fanout());
        let codes = vec!["r1".to_string(), "r2".to_string()];
        let scored = scorer
            .score_all(&codes, &ScoringWeights::default(), None)
            .await
            .unwrap();
        assert!(scored["r1"].is_ok());
        match scored["r2"].as_ref().unwrap_err() {
            ScoringFailure::OracleError(detail) => assert!(detail.contains("r2"), "detail: {detail}"),
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    struct BadSampleOracle;

    #[async_trait]
    impl IntensityOracle for BadSampleOracle {
        async fn fetch(&self, _region_code: &str) -> OracleResult<CarbonIntensitySample> {
            Ok(CarbonIntensitySample {
                location_based: f64::NAN,
                market_based: 0.1,
            })
        }
    }

    #[tokio::test]
    async fn invalid_sample_is_excluded() {
        let scorer = SustainabilityScorer::new(Arc::new(BadSampleOracle), fanout());
        let scored = scorer
            .score(&region("r1"), &ScoringWeights::default(), None)
            .await
            .unwrap();
        assert!(matches!(scored, Err(ScoringFailure::InvalidSample(_))), "{scored:?}");
    }

    struct FailingOracle;

    #[async_trait]
    impl IntensityOracle for FailingOracle {
        async fn fetch(&self, _region_code: &str) -> OracleResult<CarbonIntensitySample> {
            Err(OracleError::Status {
                status: 429,
                body: "slow down".into(),
            })
        }
    }

    #[tokio::test]
    async fn oracle_error_reason_is_recorded() {
        let scorer = SustainabilityScorer::new(Arc::new(FailingOracle), fanout());
        let reason = scorer
            .score(&region("r1"), &ScoringWeights::default(), None)
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(&reason, ScoringFailure::OracleError(detail) if detail.contains("429")));
        assert!(reason.to_string().starts_with("intensity oracle error"), "{reason}");
    }

    #[test]
    fn call_failures_map_to_typed_reasons() {
        assert_eq!(
            ScoringFailure::from(CallFailure::TimedOut(Duration::from_secs(2))),
            ScoringFailure::TimedOut
        );
        assert_eq!(
            ScoringFailure::from(CallFailure::Aborted("panicked".into())),
            ScoringFailure::Aborted("panicked".into())
        );
        let invalid = CallFailure::Oracle(OracleError::Invalid(CoreError::InvalidIntensity("location_based -1".into())));
        assert!(matches!(ScoringFailure::from(invalid), ScoringFailure::InvalidSample(_)));
    }

    #[test]
    fn scoring_failure_serializes_with_kind_tag() {
        let json = serde_json::to_value(ScoringFailure::TimedOut).unwrap();
        assert_eq!(json["kind"], "timed_out");
        let json = serde_json::to_value(ScoringFailure::OracleError("HTTP 503".into())).unwrap();
        assert_eq!(json["detail"], "HTTP 503");
    }
}
