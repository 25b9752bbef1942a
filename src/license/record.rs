//! License record wire types.
//!
//! These mirror the license file schema: a JSON document mapping client ids
//! to their license, with camelCase field names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ratelimit::TimeWindow;

/// Root of the license file: client id to license record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LicenseFile {
    #[serde(default)]
    pub clients: HashMap<String, LicenseRecord>,
}

/// One client's license.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseRecord {
    /// Opaque credential; validated by an upstream collaborator, carried
    /// here untouched
    #[serde(default)]
    pub client_secret: String,

    /// Inactive records deny every request
    #[serde(default)]
    pub active: bool,

    /// ISO-8601 calendar date after which the whole license is expired
    #[serde(default)]
    pub client_expires_at: Option<String>,

    /// Allow rules in declaration order; the first matching rule wins
    #[serde(default)]
    pub allowed_endpoints: Vec<EndpointRule>,

    /// Glob patterns denied outright, checked before any allow rule
    #[serde(default)]
    pub blocked_endpoints: Vec<String>,
}

/// One allowed endpoint with optional expiry and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointRule {
    /// Endpoint glob pattern (`**`, `*`, `?`)
    pub path: String,

    /// ISO-8601 date after which this rule alone is expired
    #[serde(default)]
    pub endpoint_expires_at: Option<String>,

    /// Rate limits; absent or all-zero means unthrottled
    #[serde(default)]
    pub limits: Option<RateLimits>,
}

/// Per-window request capacities. Zero disables a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    #[serde(default)]
    pub per_second: u32,
    #[serde(default)]
    pub per_minute: u32,
    #[serde(default)]
    pub per_hour: u32,
    #[serde(default)]
    pub per_day: u32,
}

impl RateLimits {
    /// Whether any window is configured.
    pub fn is_limited(&self) -> bool {
        self.per_second > 0 || self.per_minute > 0 || self.per_hour > 0 || self.per_day > 0
    }

    /// Capacity for one window; zero means unlimited in that window.
    pub fn capacity_for(&self, window: TimeWindow) -> u32 {
        match window {
            TimeWindow::Second => self.per_second,
            TimeWindow::Minute => self.per_minute,
            TimeWindow::Hour => self.per_hour,
            TimeWindow::Day => self.per_day,
        }
    }
}
