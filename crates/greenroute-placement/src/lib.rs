//! greenroute recommendation engine: proximity, capability gating,
//! sustainability ranking.
//!
//! Narrows a region catalog to a ranked recommendation for one workload:
//!
//! ```text
//! RegionCatalog ──► proximity filter (haversine, max distance)
//!                     │
//!                     ▼
//!                   AvailabilityGate ──► AvailabilityOracle  (region × capability)
//!                     │
//!                     ▼
//!                   SustainabilityScorer ──► IntensityOracle (per region)
//!                     │
//!                     ▼
//!                   rank (score asc, code asc)
//! ```
//!
//! # Components
//!
//! - **`fanout`**: bounded, timed, cancellable oracle call pool
//! - **`gate`**: fail-closed capability checks
//! - **`scorer`**: weighted intensity score
//! - **`engine`**: the pipeline and its request type
//! - **`result`**: ranked output, stage counts, diagnostics

pub mod engine;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod result;
pub mod scorer;

pub use engine::{RecommendRequest, RecommendationEngine};
pub use error::{EngineError, EngineResult};
pub use fanout::{CallFailure, CallResult, CancelHandle, Cancelled, FanOut};
pub use gate::{AvailabilityGate, CapabilityVerdict, GateOutcome, UnavailableReason};
pub use result::{
    Diagnostic, EmptyReason, NearbyRegion, PipelineStage, Recommendation, RecommendationResult, ScoredRegion,
    StageCounts, compare_scored, rank_regions,
};
pub use scorer::{ScoreOutcome, ScoringFailure, ScoringWeights, SustainabilityScore, SustainabilityScorer, combine};
