//! Redis-backed bucket store.
//!
//! The compare-and-swap runs as a single Lua script so the read-compare-write
//! is atomic on the server, which is what lets multiple gateway instances
//! share buckets without in-process locks.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

use super::store::{BucketStore, StoreError};

/// Atomic value-compare swap with TTL.
///
/// ARGV[1] is "1" when a prior value is expected (ARGV[2]), "0" for
/// insert-if-absent. ARGV[3] is the new value, ARGV[4] the TTL in millis.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '0' then
    if current then return 0 end
else
    if not current or current ~= ARGV[2] then return 0 end
end
redis.call('SET', KEYS[1], ARGV[3], 'PX', ARGV[4])
return 1
"#;

/// Bucket store backed by a shared Redis instance.
pub struct RedisStore {
    manager: ConnectionManager,
    cas: Script,
}

impl RedisStore {
    /// Connect to Redis at the given URL.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("redis client: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(format!("redis connect: {e}")))?;
        Ok(Self {
            manager,
            cas: Script::new(CAS_SCRIPT),
        })
    }
}

#[async_trait]
impl BucketStore for RedisStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| StoreError::Unavailable(format!("redis get: {e}")))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        new: &[u8],
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let swapped: i32 = self
            .cas
            .key(key)
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or(&[]))
            .arg(new)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("redis cas: {e}")))?;
        Ok(swapped == 1)
    }
}
