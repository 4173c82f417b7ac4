//! Bounded, expiring key→value storage.
//!
//! Entries are kept in an explicit recency list (`lru::LruCache`) that is
//! only ever touched on insert: reads use `peek`, so the list order is the
//! insertion order and the tail is always the oldest-inserted entry. When the
//! store is full, that tail is evicted regardless of its own expiry.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::Duration;

use lru::LruCache;
use metrics::{counter, gauge};
use tokio::time::Instant;
use tracing::{debug, info};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_HIT: &str = "quire_cache_hit_total";
pub(crate) const METRIC_MISS: &str = "quire_cache_miss_total";
pub(crate) const METRIC_EXPIRED: &str = "quire_cache_expired_total";
pub(crate) const METRIC_EVICT: &str = "quire_cache_evict_total";
pub(crate) const METRIC_INVALIDATED: &str = "quire_cache_invalidated_total";
pub(crate) const METRIC_ENTRIES: &str = "quire_cache_entries";

// Upper bound on an entry's lifetime; longer ttls saturate here.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let stored_at = Instant::now();
        let expires_at = stored_at
            .checked_add(ttl.min(FAR_FUTURE))
            .unwrap_or(stored_at);
        Self { value, expires_at }
    }

    /// Readable iff `now < expires_at`.
    fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Point-in-time view of a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    /// Keys from oldest to newest insertion.
    pub keys: Vec<CacheKey>,
}

/// Capacity-bounded store with per-entry expiry.
pub struct CacheStore<V> {
    entries: RwLock<LruCache<CacheKey, CacheEntry<V>>>,
    capacity: NonZeroUsize,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
            capacity,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity_non_zero())
    }

    /// Store `value` under `key` for `ttl`.
    ///
    /// Returns the key evicted to make room, if any. Re-storing an existing
    /// key replaces it as the newest entry and never evicts.
    pub fn put(&self, key: CacheKey, value: V, ttl: Duration) -> Option<CacheKey> {
        let entry = CacheEntry::new(value, ttl);
        let mut entries = rw_write(&self.entries, SOURCE, "put");

        entries.pop(&key);
        let evicted = entries.push(key.clone(), entry).map(|(evicted, _)| evicted);
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        drop(entries);

        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cached");
        if let Some(evicted) = &evicted {
            counter!(METRIC_EVICT).increment(1);
            debug!(key = %evicted, "Evicted oldest entry");
        }
        evicted
    }

    /// Fetch the value under `key` unless it is missing or expired.
    ///
    /// An expired entry is removed on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");

        let Some(entry) = entries.peek(key) else {
            counter!(METRIC_MISS).increment(1);
            return None;
        };
        if !entry.is_expired_at(now) {
            counter!(METRIC_HIT).increment(1);
            debug!(key = %key, "Cache hit");
            return Some(entry.value.clone());
        }

        entries.pop(key);
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        counter!(METRIC_EXPIRED).increment(1);
        counter!(METRIC_MISS).increment(1);
        debug!(key = %key, "Cache entry expired");
        None
    }

    /// Remove a single key, returning its value even if expired.
    pub fn remove(&self, key: &CacheKey) -> Option<V> {
        let mut entries = rw_write(&self.entries, SOURCE, "remove");
        let removed = entries.pop(key).map(|entry| entry.value);
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        removed
    }

    /// Remove every entry whose key contains `pattern`; `None` clears the store.
    ///
    /// Returns the number of removed entries.
    pub fn invalidate(&self, pattern: Option<&str>) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        let removed = match pattern {
            None => {
                let count = entries.len();
                entries.clear();
                count
            }
            Some(pattern) => {
                let doomed: Vec<CacheKey> = entries
                    .iter()
                    .filter(|(key, _)| key.contains(pattern))
                    .map(|(key, _)| key.clone())
                    .collect();
                for key in &doomed {
                    entries.pop(key);
                }
                doomed.len()
            }
        };
        gauge!(METRIC_ENTRIES).set(entries.len() as f64);
        drop(entries);

        counter!(METRIC_INVALIDATED).increment(removed as u64);
        debug!(pattern = pattern.unwrap_or("*"), removed, "Cache invalidated");
        removed
    }

    /// Drop every entry whose lifetime has passed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "sweep_expired");
        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        let remaining = entries.len();
        gauge!(METRIC_ENTRIES).set(remaining as f64);
        drop(entries);

        if !expired.is_empty() {
            counter!(METRIC_EXPIRED).increment(expired.len() as u64);
            info!(removed = expired.len(), remaining, "Swept expired cache entries");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = rw_read(&self.entries, SOURCE, "stats");
        CacheStats {
            size: entries.len(),
            capacity: self.capacity.get(),
            keys: entries.iter().rev().map(|(key, _)| key.clone()).collect(),
        }
    }
}
