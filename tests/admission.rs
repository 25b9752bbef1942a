//! End-to-end admission scenarios through the full pipeline.

use arc_swap::ArcSwap;
use std::sync::Arc;

use tollgate::admission::{AdmissionFilter, Decision, DenyReason};
use tollgate::config::{FailurePolicy, StoreConfig};
use tollgate::license::{LicenseFile, LicenseSnapshot, SharedSnapshot};
use tollgate::ratelimit::{MemoryStore, RateLimiterStore};

fn filter_for(license_json: &str) -> AdmissionFilter {
    let file: LicenseFile = serde_json::from_str(license_json).unwrap();
    let snapshot = LicenseSnapshot::compile(&file).unwrap();
    let handle: SharedSnapshot = Arc::new(ArcSwap::from_pointee(snapshot));
    let limiter = Arc::new(RateLimiterStore::new(
        Arc::new(MemoryStore::new()),
        &StoreConfig::default(),
    ));
    AdmissionFilter::new(handle, limiter, FailurePolicy::FailClosed)
}

#[tokio::test]
async fn test_acme_scenario() {
    let filter = filter_for(
        r#"{
            "clients": {
                "acme": {
                    "clientSecret": "secret",
                    "active": true,
                    "clientExpiresAt": "2099-01-01",
                    "allowedEndpoints": [
                        {
                            "path": "/v1/orders/**",
                            "limits": { "perMinute": 1 }
                        }
                    ],
                    "blockedEndpoints": []
                }
            }
        }"#,
    );

    // First request within the minute is admitted, the second is throttled.
    let first = filter.check(Some("acme"), "/v1/orders/123").await.unwrap();
    assert_eq!(first, Decision::Allow);
    let second = filter.check(Some("acme"), "/v1/orders/123").await.unwrap();
    assert_eq!(second, Decision::Deny(DenyReason::TooManyRequests));

    // No allow rule covers /v1/users.
    let users = filter.check(Some("acme"), "/v1/users").await.unwrap();
    assert_eq!(users, Decision::Deny(DenyReason::Forbidden));

    // Unknown clients never get through, whatever the path.
    let ghost = filter.check(Some("ghost"), "/v1/orders/123").await.unwrap();
    assert_eq!(ghost, Decision::Deny(DenyReason::Unauthorized));
}

#[tokio::test]
async fn test_block_list_takes_precedence() {
    let filter = filter_for(
        r#"{
            "clients": {
                "acme": {
                    "clientSecret": "secret",
                    "active": true,
                    "allowedEndpoints": [
                        { "path": "/v1/**" }
                    ],
                    "blockedEndpoints": ["/v1/billing/**"]
                }
            }
        }"#,
    );

    let open = filter.check(Some("acme"), "/v1/orders/1").await.unwrap();
    assert_eq!(open, Decision::Allow);

    // /v1/billing/invoices matches the allow rule too, but the block list
    // is evaluated first.
    let blocked = filter
        .check(Some("acme"), "/v1/billing/invoices")
        .await
        .unwrap();
    assert_eq!(blocked, Decision::Deny(DenyReason::Forbidden));
}

#[tokio::test]
async fn test_rule_order_selects_limits() {
    let filter = filter_for(
        r#"{
            "clients": {
                "acme": {
                    "clientSecret": "secret",
                    "active": true,
                    "allowedEndpoints": [
                        { "path": "/v1/orders/*", "limits": { "perMinute": 1 } },
                        { "path": "/v1/**" }
                    ],
                    "blockedEndpoints": []
                }
            }
        }"#,
    );

    // /v1/orders/1 hits the specific, limited rule.
    assert_eq!(
        filter.check(Some("acme"), "/v1/orders/1").await.unwrap(),
        Decision::Allow
    );
    assert_eq!(
        filter.check(Some("acme"), "/v1/orders/1").await.unwrap(),
        Decision::Deny(DenyReason::TooManyRequests)
    );

    // A deeper path no longer matches the single-segment rule and falls
    // through to the unlimited catch-all.
    for _ in 0..3 {
        assert_eq!(
            filter
                .check(Some("acme"), "/v1/orders/1/items")
                .await
                .unwrap(),
            Decision::Allow
        );
    }
}

#[tokio::test]
async fn test_snapshot_reload_swaps_atomically() {
    let before: LicenseFile = serde_json::from_str(
        r#"{"clients":{"acme":{"clientSecret":"s","active":true,
            "allowedEndpoints":[{"path":"/v1/**"}],"blockedEndpoints":[]}}}"#,
    )
    .unwrap();
    let after: LicenseFile = serde_json::from_str(
        r#"{"clients":{"acme":{"clientSecret":"s","active":false,
            "allowedEndpoints":[{"path":"/v1/**"}],"blockedEndpoints":[]}}}"#,
    )
    .unwrap();

    let handle: SharedSnapshot = Arc::new(ArcSwap::from_pointee(
        LicenseSnapshot::compile(&before).unwrap(),
    ));
    let limiter = Arc::new(RateLimiterStore::new(
        Arc::new(MemoryStore::new()),
        &StoreConfig::default(),
    ));
    let filter = AdmissionFilter::new(handle.clone(), limiter, FailurePolicy::FailClosed);

    assert_eq!(
        filter.check(Some("acme"), "/v1/x").await.unwrap(),
        Decision::Allow
    );

    // Publish the deactivated license set; the very next check sees it.
    handle.store(Arc::new(LicenseSnapshot::compile(&after).unwrap()));
    assert_eq!(
        filter.check(Some("acme"), "/v1/x").await.unwrap(),
        Decision::Deny(DenyReason::Unauthorized)
    );
}
