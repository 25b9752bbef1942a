//! Immutable, queryable view of the loaded license set.
//!
//! The snapshot is built once from the license file with every endpoint
//! pattern pre-compiled, then published through an [`ArcSwap`] handle.
//! Readers are lock-free; reload replaces the whole snapshot atomically so a
//! concurrent request never observes a half-updated license set.

use arc_swap::ArcSwap;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, TollgateError};
use crate::pattern::PathPattern;

use super::record::{LicenseFile, RateLimits};

/// Atomically swappable handle to the current snapshot.
pub type SharedSnapshot = Arc<ArcSwap<LicenseSnapshot>>;

/// An allow rule with its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Compiled endpoint pattern
    pub pattern: PathPattern,
    /// ISO-8601 expiry date for this rule, if any
    pub expires_at: Option<String>,
    /// Rate limits; all-zero means unthrottled
    pub limits: RateLimits,
}

/// One client's license with all patterns compiled.
#[derive(Debug, Clone)]
pub struct ClientEntry {
    /// Opaque credential, passed through for upstream validators
    pub client_secret: String,
    /// Whether the license is active
    pub active: bool,
    /// ISO-8601 expiry of the whole license, if any
    pub expires_at: Option<String>,
    /// Allow rules in declaration order
    pub allowed: Vec<CompiledRule>,
    /// Blocked patterns, checked before allow rules
    pub blocked: Vec<PathPattern>,
}

/// Immutable license snapshot with compiled patterns.
#[derive(Debug, Default)]
pub struct LicenseSnapshot {
    clients: HashMap<String, ClientEntry>,
}

impl LicenseSnapshot {
    /// Compile a snapshot from parsed license records.
    ///
    /// Any malformed pattern fails the whole compilation: the process must
    /// not serve traffic from a partially usable license set.
    pub fn compile(file: &LicenseFile) -> Result<Self> {
        let mut clients = HashMap::with_capacity(file.clients.len());

        for (client_id, record) in &file.clients {
            let allowed = record
                .allowed_endpoints
                .iter()
                .map(|rule| {
                    Ok(CompiledRule {
                        pattern: PathPattern::compile(&rule.path).map_err(|e| {
                            TollgateError::License(format!(
                                "client {client_id}: allowed pattern {:?}: {e}",
                                rule.path
                            ))
                        })?,
                        expires_at: rule.endpoint_expires_at.clone(),
                        limits: rule.limits.unwrap_or_default(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let blocked = record
                .blocked_endpoints
                .iter()
                .map(|pattern| {
                    PathPattern::compile(pattern).map_err(|e| {
                        TollgateError::License(format!(
                            "client {client_id}: blocked pattern {pattern:?}: {e}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            clients.insert(
                client_id.clone(),
                ClientEntry {
                    client_secret: record.client_secret.clone(),
                    active: record.active,
                    expires_at: record.client_expires_at.clone(),
                    allowed,
                    blocked,
                },
            );
        }

        Ok(Self { clients })
    }

    /// Look up a client's compiled license.
    pub fn get(&self, client_id: &str) -> Option<&ClientEntry> {
        self.clients.get(client_id)
    }

    /// Whether a record exists for this client.
    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    /// Number of licensed clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// True iff the record exists, is active, and has not expired as of
    /// today's UTC date.
    pub fn is_license_valid(&self, client_id: &str) -> bool {
        self.is_license_valid_on(client_id, Utc::now().date_naive())
    }

    fn is_license_valid_on(&self, client_id: &str, today: NaiveDate) -> bool {
        let Some(entry) = self.clients.get(client_id) else {
            return false;
        };
        if !entry.active {
            return false;
        }
        match &entry.expires_at {
            Some(date) => !is_date_expired_on(date, today),
            None => true,
        }
    }

    /// True iff the path matches any of the client's blocked patterns.
    pub fn find_blocking_rule(&self, client_id: &str, path: &str) -> bool {
        self.clients
            .get(client_id)
            .map(|entry| entry.blocked.iter().any(|p| p.matches(path)))
            .unwrap_or(false)
    }

    /// First allow rule, in declaration order, whose pattern matches the path.
    pub fn find_allowed_rule(&self, client_id: &str, path: &str) -> Option<&CompiledRule> {
        self.clients
            .get(client_id)?
            .allowed
            .iter()
            .find(|rule| rule.pattern.matches(path))
    }
}

/// Whether an ISO-8601 calendar date lies strictly in the past (UTC).
///
/// A date equal to today is not expired. An unparseable date counts as
/// expired: expiry enforcement fails toward denial, never toward access.
pub fn is_date_expired(date: &str) -> bool {
    is_date_expired_on(date, Utc::now().date_naive())
}

fn is_date_expired_on(date: &str, today: NaiveDate) -> bool {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(expiry) => today > expiry,
        Err(_) => true,
    }
}
