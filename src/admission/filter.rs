//! The admission pipeline.
//!
//! Each request runs the same strict sequence, short-circuiting at the first
//! failing step:
//!
//! 1. client id present and licensed, else Unauthorized
//! 2. license active and unexpired, else Unauthorized
//! 3. path not blocked, else Forbidden
//! 4. some allow rule matches, else Forbidden
//! 5. the matching rule is unexpired, else Forbidden
//! 6. if the rule carries limits, a token is consumed, else TooManyRequests
//!
//! The filter keeps no state between requests; everything shared lives in
//! the snapshot (lock-free reads) and the bucket store (CAS-coordinated).

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::FailurePolicy;
use crate::error::Result;
use crate::license::{is_date_expired, SharedSnapshot};
use crate::ratelimit::RateLimiterStore;

use super::decision::{Decision, DenyReason};

/// Per-request admission decision engine.
pub struct AdmissionFilter {
    snapshot: SharedSnapshot,
    limiter: Arc<RateLimiterStore>,
    failure_policy: FailurePolicy,
}

impl AdmissionFilter {
    /// Create a filter over a license snapshot handle and a limiter.
    pub fn new(
        snapshot: SharedSnapshot,
        limiter: Arc<RateLimiterStore>,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            snapshot,
            limiter,
            failure_policy,
        }
    }

    /// Decide whether the request may proceed.
    ///
    /// Denials are per-request outcomes, not faults. The only error case is
    /// an unreachable bucket store under the fail-closed policy; fail-open
    /// admits instead and logs.
    pub async fn check(&self, client_id: Option<&str>, path: &str) -> Result<Decision> {
        let snapshot = self.snapshot.load_full();

        let Some(client_id) = client_id else {
            return Ok(deny(None, path, DenyReason::Unauthorized));
        };
        if !snapshot.contains(client_id) {
            return Ok(deny(Some(client_id), path, DenyReason::Unauthorized));
        }

        if !snapshot.is_license_valid(client_id) {
            return Ok(deny(Some(client_id), path, DenyReason::Unauthorized));
        }

        if snapshot.find_blocking_rule(client_id, path) {
            return Ok(deny(Some(client_id), path, DenyReason::Forbidden));
        }

        let Some(rule) = snapshot.find_allowed_rule(client_id, path) else {
            return Ok(deny(Some(client_id), path, DenyReason::Forbidden));
        };

        if let Some(date) = &rule.expires_at {
            if is_date_expired(date) {
                return Ok(deny(Some(client_id), path, DenyReason::Forbidden));
            }
        }

        if rule.limits.is_limited() {
            let key = self.limiter.bucket_key(client_id, rule.pattern.as_str());
            match self.limiter.try_consume(&key, &rule.limits, 1).await {
                Ok(true) => {}
                Ok(false) => {
                    return Ok(deny(Some(client_id), path, DenyReason::TooManyRequests));
                }
                Err(e) => match self.failure_policy {
                    FailurePolicy::FailOpen => {
                        warn!(
                            client_id = %client_id,
                            path = %path,
                            error = %e,
                            "Bucket store unavailable, admitting per fail-open policy"
                        );
                    }
                    FailurePolicy::FailClosed => return Err(e.into()),
                },
            }
        }

        Ok(Decision::Allow)
    }
}

fn deny(client_id: Option<&str>, path: &str, reason: DenyReason) -> Decision {
    debug!(
        client_id = client_id.unwrap_or("<none>"),
        path = %path,
        reason = reason.as_str(),
        "Request denied"
    );
    Decision::Deny(reason)
}
