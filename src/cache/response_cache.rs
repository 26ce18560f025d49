//! Response cache keyed by request identity, with TTL expiry.
//!
//! Entries are response snapshots stamped with their insertion time. An
//! entry is fresh while `now - timestamp < ttl`. Staleness is only noticed
//! on lookup: a stale hit is removed and reported as a miss. Nothing is
//! evicted proactively and nothing is persisted.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::transport::HttpResponse;
use crate::utils::RequestKey;

/// Freshness window applied to every entry (one hour).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_millis(3_600_000);

/// A single cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// When the entry was inserted.
    pub timestamp: Instant,
    /// Snapshot of the response; its body can be read any number of times.
    pub response: HttpResponse,
    /// Number of fresh lookups served from this entry.
    pub hit_count: u32,
}

/// In-memory response cache with TTL expiry.
pub struct ResponseCache {
    entries: HashMap<RequestKey, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh entry.
    ///
    /// A stale entry is removed and `None` is returned. On a hit the entry's
    /// `hit_count` is bumped and a copy is returned.
    pub fn get(&mut self, key: &str) -> Option<CacheEntry> {
        let fresh = self.entries.get(key).map(|e| self.is_fresh(e))?;
        if !fresh {
            debug!(key = %key, "Cache entry expired, removing");
            self.entries.remove(key);
            return None;
        }
        let entry = self.entries.get_mut(key)?;
        entry.hit_count = entry.hit_count.saturating_add(1);
        Some(entry.clone())
    }

    /// Whether `entry` is still inside the freshness window.
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        Instant::now().saturating_duration_since(entry.timestamp) < self.ttl
    }

    /// Store a snapshot of `response` under `key`, replacing any prior entry.
    pub fn put(&mut self, key: RequestKey, response: &HttpResponse) {
        debug!(key = %key, status = response.status.as_u16(), "Caching response");
        self.entries.insert(
            key,
            CacheEntry {
                timestamp: Instant::now(),
                response: response.clone(),
                hit_count: 0,
            },
        );
    }

    /// Remove the entry for `key`. Returns `true` if one existed.
    pub fn evict(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            total_hits: self
                .entries
                .values()
                .map(|e| u64::from(e.hit_count))
                .sum(),
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently in the cache (fresh or not yet noticed stale).
    pub total_entries: usize,
    /// Cumulative number of cache hits across all entries.
    pub total_hits: u64,
}
