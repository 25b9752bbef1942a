//! Token bucket state shared through the distributed store.
//!
//! A bucket holds one sub-bucket per configured window. Refill disciplines,
//! fixed for the lifetime of the deployment:
//!
//! - the per-second window refills greedily: tokens accrue continuously at
//!   `capacity` per second, capped at `capacity`;
//! - minute, hour and day windows refill by interval: the full capacity is
//!   restored once per elapsed window, never in between.
//!
//! Consumption is all-or-nothing across the sub-buckets: a request is
//! admitted only when every window has enough tokens, and a rejection
//! decrements nothing.

use serde::{Deserialize, Serialize};

use crate::license::RateLimits;

use super::window::TimeWindow;

/// State of one window's sub-bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBucket {
    /// Which window this sub-bucket meters
    pub window: TimeWindow,
    /// Maximum tokens; never exceeded
    pub capacity: u32,
    /// Tokens currently available
    pub tokens: u32,
    /// Unix millis of the last refill accounting
    pub refilled_at_ms: i64,
}

impl WindowBucket {
    fn new(window: TimeWindow, capacity: u32, now_ms: i64) -> Self {
        Self {
            window,
            capacity,
            tokens: capacity,
            refilled_at_ms: now_ms,
        }
    }

    fn refill(&mut self, now_ms: i64) {
        let elapsed = now_ms.saturating_sub(self.refilled_at_ms);
        if elapsed <= 0 {
            return;
        }
        let window_ms = self.window.as_millis();

        match self.window {
            TimeWindow::Second => {
                // Greedy: accrue proportionally to elapsed time, advance the
                // refill mark only by the time actually converted to tokens
                // so fractional accrual is not lost. Widened to i128: a large
                // capacity left idle long enough overflows the i64 product.
                let added = (elapsed as i128 * self.capacity as i128) / window_ms as i128;
                if added > 0 {
                    self.tokens = (self.tokens as i128 + added).min(self.capacity as i128) as u32;
                    self.refilled_at_ms +=
                        ((added * window_ms as i128) / self.capacity as i128) as i64;
                }
            }
            _ => {
                // Interval: restore the full capacity once per elapsed window.
                let periods = elapsed / window_ms;
                if periods > 0 {
                    self.tokens = self.capacity;
                    self.refilled_at_ms += periods * window_ms;
                }
            }
        }
    }
}

/// Bucket state for one `clientId:pathPattern` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketState {
    /// Sub-buckets, one per configured window, finest first
    pub windows: Vec<WindowBucket>,
}

impl BucketState {
    /// Create a full bucket for every nonzero window in `limits`.
    pub fn new(limits: &RateLimits, now_ms: i64) -> Self {
        let windows = TimeWindow::ALL
            .iter()
            .filter_map(|&w| {
                let capacity = limits.capacity_for(w);
                (capacity > 0).then(|| WindowBucket::new(w, capacity, now_ms))
            })
            .collect();
        Self { windows }
    }

    /// Whether the stored layout still matches the rule's limits.
    ///
    /// A rule edited between restarts leaves stale layouts behind; callers
    /// discard those and rebuild from the limits.
    pub fn matches_limits(&self, limits: &RateLimits) -> bool {
        let mut expected = TimeWindow::ALL
            .iter()
            .filter_map(|&w| {
                let capacity = limits.capacity_for(w);
                (capacity > 0).then_some((w, capacity))
            });
        let mut actual = self.windows.iter().map(|b| (b.window, b.capacity));
        loop {
            match (expected.next(), actual.next()) {
                (None, None) => return true,
                (Some(e), Some(a)) if e == a => continue,
                _ => return false,
            }
        }
    }

    /// Apply refill to every sub-bucket up to `now_ms`.
    pub fn refill(&mut self, now_ms: i64) {
        for bucket in &mut self.windows {
            bucket.refill(now_ms);
        }
    }

    /// Consume `cost` tokens from every window, or nothing at all.
    ///
    /// Returns `true` when every window had enough tokens and all were
    /// decremented, `false` when any window fell short (no decrements).
    pub fn try_consume(&mut self, cost: u32) -> bool {
        if self.windows.iter().any(|b| b.tokens < cost) {
            return false;
        }
        for bucket in &mut self.windows {
            bucket.tokens -= cost;
        }
        true
    }

    /// Serialize for the shared store.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from the shared store.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
