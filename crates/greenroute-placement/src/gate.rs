//! Capability gate: does a region offer everything the workload needs?
//!
//! Each (region, capability) pair is checked independently. A region
//! passes only if every check says "available"; oracle errors, timeouts
//! and aborted calls count as "not available" for that one pair.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use greenroute_core::{CapabilityRequest, CapabilitySet, Region};
use greenroute_oracle::AvailabilityOracle;

use crate::fanout::{CallFailure, CallResult, CancelHandle, Cancelled, FanOut};

/// Why a capability counts as unavailable in a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The oracle answered: not offered.
    NotOffered,
    /// The oracle call failed.
    OracleError(String),
    /// The oracle did not answer within the call timeout.
    TimedOut,
    /// The call task died before answering.
    Aborted(String),
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableReason::NotOffered => f.write_str("not offered"),
            UnavailableReason::OracleError(e) => write!(f, "oracle error: {e}"),
            UnavailableReason::TimedOut => f.write_str("timed out"),
            UnavailableReason::Aborted(e) => write!(f, "aborted: {e}"),
        }
    }
}

/// Outcome of one (region, capability) check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityVerdict {
    pub capability: CapabilityRequest,
    pub available: bool,
    pub reason: Option<UnavailableReason>,
}

impl CapabilityVerdict {
    fn from_call(region_code: &str, capability: CapabilityRequest, result: CallResult<bool>) -> Self {
        let reason = match result {
            Ok(true) => None,
            Ok(false) => Some(UnavailableReason::NotOffered),
            Err(CallFailure::Oracle(e)) => {
                warn!(region = region_code, %capability, error = %e, "availability check failed, treating as unavailable");
                Some(UnavailableReason::OracleError(e.to_string()))
            }
            Err(CallFailure::TimedOut(after)) => {
                warn!(region = region_code, %capability, ?after, "availability check timed out, treating as unavailable");
                Some(UnavailableReason::TimedOut)
            }
            Err(CallFailure::Aborted(e)) => {
                warn!(region = region_code, %capability, error = %e, "availability check aborted, treating as unavailable");
                Some(UnavailableReason::Aborted(e))
            }
        };
        Self {
            capability,
            available: reason.is_none(),
            reason,
        }
    }
}

/// All verdicts for one region, sorted by capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub region_code: String,
    pub verdicts: Vec<CapabilityVerdict>,
}

impl GateOutcome {
    /// True iff every required capability is available. Vacuously true for
    /// an empty requirement set.
    pub fn satisfied(&self) -> bool {
        self.verdicts.iter().all(|v| v.available)
    }

    /// The verdicts that failed the gate.
    pub fn missing(&self) -> impl Iterator<Item = &CapabilityVerdict> {
        self.verdicts.iter().filter(|v| !v.available)
    }
}

/// Fail-closed availability gate over an [`AvailabilityOracle`].
#[derive(Clone)]
pub struct AvailabilityGate {
    oracle: Arc<dyn AvailabilityOracle>,
    fanout: FanOut,
}

impl AvailabilityGate {
    pub fn new(oracle: Arc<dyn AvailabilityOracle>, fanout: FanOut) -> Self {
        Self { oracle, fanout }
    }

    /// Check one region against the required capabilities.
    pub async fn is_satisfied(
        &self,
        region: &Region,
        required: &CapabilitySet,
        cancel: Option<&CancelHandle>,
    ) -> Result<GateOutcome, Cancelled> {
        let mut outcomes = self
            .evaluate(std::slice::from_ref(&region.code), required, cancel)
            .await?;
        Ok(outcomes.remove(&region.code).unwrap_or_else(|| GateOutcome {
            region_code: region.code.clone(),
            verdicts: Vec::new(),
        }))
    }

    /// Check many regions at once; every (region, capability) pair is one
    /// fanned-out call. Returns one outcome per region code.
    pub async fn evaluate(
        &self,
        region_codes: &[String],
        required: &CapabilitySet,
        cancel: Option<&CancelHandle>,
    ) -> Result<BTreeMap<String, GateOutcome>, Cancelled> {
        let mut calls = Vec::with_capacity(region_codes.len() * required.len());
        for code in region_codes {
            for capability in required {
                let oracle = self.oracle.clone();
                let region = code.clone();
                let token = capability.as_str().to_string();
                calls.push((
                    (code.clone(), capability.clone()),
                    async move { oracle.check(&region, &token).await },
                ));
            }
        }
        debug!(
            regions = region_codes.len(),
            capabilities = required.len(),
            calls = calls.len(),
            "running availability checks"
        );

        let results = self.fanout.run(calls, cancel).await?;

        let mut outcomes: BTreeMap<String, GateOutcome> = region_codes
            .iter()
            .map(|code| {
                (
                    code.clone(),
                    GateOutcome {
                        region_code: code.clone(),
                        verdicts: Vec::with_capacity(required.len()),
                    },
                )
            })
            .collect();
        // BTreeMap iteration is ordered by (region, capability), so verdicts
        // land sorted regardless of completion order.
        for ((code, capability), result) in results {
            let verdict = CapabilityVerdict::from_call(&code, capability, result);
            if let Some(outcome) = outcomes.get_mut(&code) {
                outcome.verdicts.push(verdict);
            }
        }
        Ok(outcomes)
    }
}
