//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// License data source configuration
    pub license: LicenseConfig,

    /// Shared rate limit store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Request header carrying the client identity
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_key_header: default_api_key_header(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

/// License data source configuration.
///
/// The license file is required: serving traffic without a loaded license
/// set is a fatal configuration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseConfig {
    /// Path to the license JSON file
    pub path: String,

    /// License reload interval in seconds (0 disables periodic reload)
    #[serde(default = "default_reload_interval")]
    pub reload_interval_secs: u64,
}

fn default_reload_interval() -> u64 {
    0
}

/// Policy applied when the shared store cannot answer a consume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Reject the request when the store is unreachable (default)
    FailClosed,
    /// Admit the request when the store is unreachable
    FailOpen,
}

/// Shared rate limit store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL; when unset, buckets are kept in process memory
    /// (single-instance deployments and tests only)
    pub redis_url: Option<String>,

    /// Prefix for bucket keys in the shared store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Timeout for a single store round trip, in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Retries for store transport faults before the failure policy applies
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retries for compare-and-swap conflicts before giving up
    #[serde(default = "default_cas_retries")]
    pub cas_retries: u32,

    /// What to do when the store stays unreachable
    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_key_prefix(),
            request_timeout_ms: default_request_timeout(),
            max_retries: default_max_retries(),
            cas_retries: default_cas_retries(),
            failure_policy: default_failure_policy(),
        }
    }
}

fn default_key_prefix() -> String {
    "tollgate".to_string()
}

fn default_request_timeout() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    2
}

fn default_cas_retries() -> u32 {
    16
}

fn default_failure_policy() -> FailurePolicy {
    FailurePolicy::FailClosed
}

impl TollgateConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TollgateConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::TollgateError::Config(e.to_string()))?;
        Ok(config)
    }
}
