//! Distributed multi-window token bucket rate limiting.

mod bucket;
mod limiter;
mod redis;
mod store;
mod window;

pub use bucket::BucketState;
pub use limiter::RateLimiterStore;
pub use redis::RedisStore;
pub use store::{BucketStore, MemoryStore, StoreError};
pub use window::TimeWindow;
