//! Response caching with TTL and lazy eviction.

pub mod response_cache;

pub use response_cache::{CacheEntry, CacheStats, ResponseCache, DEFAULT_CACHE_TTL};
