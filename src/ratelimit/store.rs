//! Shared bucket store abstraction.
//!
//! The limiter coordinates concurrent writers through optimistic
//! compare-and-swap on opaque byte values, the only primitive it needs from
//! the store. `MemoryStore` is the in-process implementation used for tests
//! and single-instance deployments; `RedisStore` (in `redis.rs`) is the
//! production backend shared across gateway instances.

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a bucket store.
///
/// None of these mean "limit exceeded": quota exhaustion is a successful
/// `false` from the limiter, never an error.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not be reached or answered with a transport fault
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A store round trip exceeded the configured deadline
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Stored bucket state could not be encoded or decoded
    #[error("bucket state codec error: {0}")]
    Codec(String),

    /// Compare-and-swap kept conflicting past the retry budget
    #[error("compare-and-swap contention persisted through {0} attempts")]
    Contention(u32),
}

impl StoreError {
    /// Transport faults are retried with backoff; codec and contention
    /// faults are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// A key-value store with optimistic concurrency control.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Read the current value for a key.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `new` only if the key still holds `expected`.
    ///
    /// `expected == None` means "insert only if absent". Returns `true` when
    /// the swap happened, `false` when the key changed since it was read
    /// (the caller re-reads and retries). `ttl` bounds how long an idle key
    /// is retained.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

/// In-process bucket store backed by a concurrent map.
///
/// Entries never expire; the TTL argument is accepted and ignored.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys, for tests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
        _ttl: Duration,
    ) -> Result<bool, StoreError> {
        use dashmap::mapref::entry::Entry;

        // The dashmap entry holds its shard lock, making the
        // compare-and-swap atomic against concurrent writers.
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => match expected {
                Some(bytes) if occupied.get().as_slice() == bytes => {
                    occupied.insert(new.to_vec());
                    Ok(true)
                }
                _ => Ok(false),
            },
            Entry::Vacant(vacant) => {
                if expected.is_none() {
                    vacant.insert(new.to_vec());
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_read_missing_key() {
        let store = MemoryStore::new();
        assert!(store.read("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("k", None, b"v1", TTL).await.unwrap());
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some(&b"v1"[..]));

        // A second insert-if-absent must lose, and no extra key appears.
        assert!(!store.compare_and_swap("k", None, b"v2", TTL).await.unwrap());
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some(&b"v1"[..]));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_swap_with_matching_expected() {
        let store = MemoryStore::new();
        store.compare_and_swap("k", None, b"v1", TTL).await.unwrap();

        assert!(store
            .compare_and_swap("k", Some(b"v1"), b"v2", TTL)
            .await
            .unwrap());
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some(&b"v2"[..]));
    }

    #[tokio::test]
    async fn test_swap_with_stale_expected_fails() {
        let store = MemoryStore::new();
        store.compare_and_swap("k", None, b"v1", TTL).await.unwrap();
        store
            .compare_and_swap("k", Some(b"v1"), b"v2", TTL)
            .await
            .unwrap();

        // Writer still holding v1 must not clobber v2.
        assert!(!store
            .compare_and_swap("k", Some(b"v1"), b"v3", TTL)
            .await
            .unwrap());
        assert_eq!(store.read("k").await.unwrap().as_deref(), Some(&b"v2"[..]));
    }

    #[tokio::test]
    async fn test_swap_against_absent_key_fails() {
        let store = MemoryStore::new();
        assert!(!store
            .compare_and_swap("k", Some(b"v1"), b"v2", TTL)
            .await
            .unwrap());
        assert!(store.is_empty());
    }
}
