//! Bounded-concurrency fan-out of independent oracle calls.
//!
//! Every call runs as its own task on a `JoinSet`, gated by a semaphore and
//! wrapped in a per-call timeout. Results are keyed, so the order in which
//! calls complete never leaks into the caller's view.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use greenroute_oracle::{OracleError, OracleResult};

/// Why a single fanned-out call produced no value.
#[derive(Debug, Clone, Error)]
pub enum CallFailure {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("task aborted: {0}")]
    Aborted(String),
}

pub type CallResult<T> = Result<T, CallFailure>;

/// The caller abandoned the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request cancelled")]
pub struct Cancelled;

/// Cancellation signal shared between a caller and an in-flight request.
///
/// Clones observe the same signal; cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once the handle is cancelled; never resolves without one.
async fn cancelled(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        Some(rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

/// Fan-out policy: concurrency bound and per-call timeout.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    max_concurrency: usize,
    call_timeout: Duration,
}

impl FanOut {
    pub fn new(max_concurrency: usize, call_timeout: Duration) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            call_timeout,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Run every call and collect one result per key.
    ///
    /// Keys must be unique; a repeated key keeps only one result. On
    /// cancellation all outstanding calls are aborted.
    pub async fn run<K, T, F>(
        &self,
        calls: Vec<(K, F)>,
        cancel: Option<&CancelHandle>,
    ) -> Result<BTreeMap<K, CallResult<T>>, Cancelled>
    where
        K: Ord + Clone + Send + std::fmt::Debug + 'static,
        T: Send + 'static,
        F: Future<Output = OracleResult<T>> + Send + 'static,
    {
        if cancel.is_some_and(CancelHandle::is_cancelled) {
            return Err(Cancelled);
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let timeout = self.call_timeout;
        let keys: Vec<K> = calls.iter().map(|(key, _)| key.clone()).collect();

        let mut set = JoinSet::new();
        for (key, call) in calls {
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => match tokio::time::timeout(timeout, call).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(CallFailure::Oracle(e)),
                        Err(_) => Err(CallFailure::TimedOut(timeout)),
                    },
                    Err(_) => Err(CallFailure::Aborted("concurrency limiter closed".into())),
                };
                (key, outcome)
            });
        }

        let mut watcher = cancel.map(CancelHandle::subscribe);
        let mut results = BTreeMap::new();
        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut watcher) => {
                    debug!(pending = set.len(), "fan-out cancelled, aborting pending calls");
                    set.abort_all();
                    return Err(Cancelled);
                }
                joined = set.join_next() => match joined {
                    Some(Ok((key, outcome))) => {
                        results.insert(key, outcome);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "fan-out task failed");
                    }
                    None => break,
                },
            }
        }

        // A panicked task loses its key; report it rather than dropping it.
        for key in keys {
            if !results.contains_key(&key) {
                warn!(?key, "fan-out call produced no result");
                results.insert(key, Err(CallFailure::Aborted("task panicked".into())));
            }
        }
        Ok(results)
    }
}
