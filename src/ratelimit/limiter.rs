//! Multi-window rate limiter over the shared bucket store.
//!
//! Every `try_consume` is one optimistic transaction: read the current
//! bucket bytes, refill and decrement locally, then conditionally write the
//! new state back. A conflicting writer makes the conditional write fail and
//! the whole transaction is retried from a fresh read, so two gateways can
//! never both decrement from the same stale state.

use chrono::Utc;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::license::RateLimits;

use super::bucket::BucketState;
use super::store::{BucketStore, StoreError};
use super::window::TimeWindow;

/// Distributed token bucket limiter.
///
/// Holds no per-key state in process; everything lives in the store so all
/// gateway instances account against the same buckets.
pub struct RateLimiterStore {
    store: Arc<dyn BucketStore>,
    key_prefix: String,
    request_timeout: Duration,
    max_retries: u32,
    cas_retries: u32,
}

impl RateLimiterStore {
    /// Create a limiter over the given store.
    pub fn new(store: Arc<dyn BucketStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            key_prefix: config.key_prefix.clone(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            max_retries: config.max_retries,
            cas_retries: config.cas_retries,
        }
    }

    /// Bucket key for a client and the allow rule's declared pattern.
    ///
    /// The key uses the rule's pattern, not the concrete request path: every
    /// request matching the same rule draws from one bucket, which is the
    /// unit of quota.
    pub fn bucket_key(&self, client_id: &str, path_pattern: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, client_id, path_pattern)
    }

    /// Try to consume `cost` tokens from every configured window for `key`.
    ///
    /// Returns `Ok(true)` when admitted, `Ok(false)` when any window is out
    /// of tokens (nothing is consumed in that case), and an error only for
    /// store faults, which callers resolve through their failure policy.
    pub async fn try_consume(
        &self,
        key: &str,
        limits: &RateLimits,
        cost: u32,
    ) -> Result<bool, StoreError> {
        self.try_consume_at(key, limits, cost, Utc::now().timestamp_millis())
            .await
    }

    /// Deterministic variant of [`try_consume`](Self::try_consume) taking the
    /// evaluation time explicitly. Used by tests and simulations.
    pub async fn try_consume_at(
        &self,
        key: &str,
        limits: &RateLimits,
        cost: u32,
        now_ms: i64,
    ) -> Result<bool, StoreError> {
        let ttl = retention(limits);

        for attempt in 0..self.cas_retries {
            let current = self.with_retry("read", || self.store.read(key)).await?;

            let (expected, mut state) = match current {
                Some(bytes) => match BucketState::from_bytes(&bytes) {
                    Ok(state) if state.matches_limits(limits) => (Some(bytes), state),
                    _ => {
                        // Undecodable or stale layout: the rule changed since
                        // this bucket was written. Start over from the limits.
                        debug!(key = %key, "Rebuilding bucket state from limits");
                        (Some(bytes), BucketState::new(limits, now_ms))
                    }
                },
                None => (None, BucketState::new(limits, now_ms)),
            };

            state.refill(now_ms);

            if !state.try_consume(cost) {
                trace!(key = %key, cost = cost, "Rate limit exceeded");
                return Ok(false);
            }

            let new = state
                .to_bytes()
                .map_err(|e| StoreError::Codec(e.to_string()))?;

            let swapped = self
                .with_retry("cas", || {
                    self.store
                        .compare_and_swap(key, expected.as_deref(), &new, ttl)
                })
                .await?;
            if swapped {
                trace!(key = %key, cost = cost, "Tokens consumed");
                return Ok(true);
            }

            // Lost the race to another writer; back off briefly and re-read.
            trace!(key = %key, attempt = attempt, "Compare-and-swap conflict");
            tokio::time::sleep(conflict_backoff(attempt)).await;
        }

        Err(StoreError::Contention(self.cas_retries))
    }

    /// Run one store operation with a deadline and bounded retries for
    /// transport faults.
    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.request_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(self.request_timeout)),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(
                        op = op,
                        attempt = attempt,
                        error = %e,
                        "Store fault, retrying"
                    );
                    tokio::time::sleep(fault_backoff(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Idle buckets are kept as long as their coarsest window so counts survive
/// between requests but do not pile up in the store forever.
fn retention(limits: &RateLimits) -> Duration {
    TimeWindow::ALL
        .iter()
        .rev()
        .find(|&&w| limits.capacity_for(w) > 0)
        .map(|w| w.duration())
        .unwrap_or(Duration::from_secs(60))
}

fn conflict_backoff(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..3);
    Duration::from_millis((attempt as u64) + jitter)
}

fn fault_backoff(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..10);
    Duration::from_millis((10u64 << attempt.min(6)) + jitter)
}
