//! Static and cached carbon intensity oracles.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use greenroute_core::CarbonIntensitySample;

use crate::error::{OracleError, OracleResult};
use crate::traits::IntensityOracle;

/// Fixed samples keyed by region code. Unlisted regions are an error.
#[derive(Debug, Clone, Default)]
pub struct StaticIntensityTable {
    samples: BTreeMap<String, CarbonIntensitySample>,
}

impl StaticIntensityTable {
    pub fn new(samples: BTreeMap<String, CarbonIntensitySample>) -> Self {
        Self { samples }
    }

    pub fn with_sample(mut self, region_code: &str, sample: CarbonIntensitySample) -> Self {
        self.samples.insert(region_code.to_string(), sample);
        self
    }
}

#[async_trait]
impl IntensityOracle for StaticIntensityTable {
    async fn fetch(&self, region_code: &str) -> OracleResult<CarbonIntensitySample> {
        self.samples
            .get(region_code)
            .copied()
            .ok_or_else(|| OracleError::UnknownRegion(region_code.to_string()))
    }
}

/// Wraps another intensity oracle and reuses samples younger than `ttl`.
///
/// Failures are never cached. This is the only cache that may outlive a
/// single recommendation request.
pub struct CachedIntensityOracle {
    inner: Arc<dyn IntensityOracle>,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, CarbonIntensitySample)>>,
}

impl CachedIntensityOracle {
    pub fn new(inner: Arc<dyn IntensityOracle>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every cached sample.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    async fn fresh(&self, region_code: &str) -> Option<CarbonIntensitySample> {
        let mut entries = self.entries.lock().await;
        if let Some((fetched_at, sample)) = entries.get(region_code) {
            if fetched_at.elapsed() < self.ttl {
                return Some(*sample);
            }
        }
        entries.remove(region_code);
        None
    }
}

#[async_trait]
impl IntensityOracle for CachedIntensityOracle {
    async fn fetch(&self, region_code: &str) -> OracleResult<CarbonIntensitySample> {
        if let Some(sample) = self.fresh(region_code).await {
            debug!(region = region_code, "intensity cache hit");
            return Ok(sample);
        }

        // The lock is not held across the inner call; concurrent misses for
        // the same region may both fetch, and the later one wins.
        let sample = self.inner.fetch(region_code).await?;
        self.entries
            .lock()
            .await
            .insert(region_code.to_string(), (Instant::now(), sample));
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl IntensityOracle for Counting {
        async fn fetch(&self, _region_code: &str) -> OracleResult<CarbonIntensitySample> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as f64;
            if self.fail {
                return Err(OracleError::Unavailable("rate limited".into()));
            }
            Ok(CarbonIntensitySample::new(0.1 + n, 0.05)?)
        }
    }

    fn counting(fail: bool) -> Arc<Counting> {
        Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn static_table_lookup() {
        let table = StaticIntensityTable::default()
            .with_sample("eu-north-1", CarbonIntensitySample::new(0.03, 0.01).unwrap());
        assert_eq!(table.fetch("eu-north-1").await.unwrap().location_based, 0.03);
        assert!(matches!(
            table.fetch("eu-west-1").await,
            Err(OracleError::UnknownRegion(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_serves_within_ttl() {
        let inner = counting(false);
        let cached = CachedIntensityOracle::new(inner.clone(), Duration::from_secs(60));

        let first = cached.fetch("r1").await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        let second = cached.fetch("r1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_refetches_after_ttl() {
        let inner = counting(false);
        let cached = CachedIntensityOracle::new(inner.clone(), Duration::from_secs(60));

        let first = cached.fetch("r1").await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = cached.fetch("r1").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_keys_by_region() {
        let inner = counting(false);
        let cached = CachedIntensityOracle::new(inner.clone(), Duration::from_secs(60));
        cached.fetch("r1").await.unwrap();
        cached.fetch("r2").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        cached.clear().await;
        cached.fetch("r1").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let inner = counting(true);
        let cached = CachedIntensityOracle::new(inner.clone(), Duration::from_secs(60));
        assert!(cached.fetch("r1").await.is_err());
        assert!(cached.fetch("r1").await.is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
