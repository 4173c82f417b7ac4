//! Cache configuration.
//!
//! Capacity, sweep cadence and per-kind lifetimes, loaded from the `[cache]`
//! section of `quire.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::keys::EntityKind;

// Tuning defaults; none of these are correctness requirements.
const DEFAULT_CAPACITY: usize = 100;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_USER_TTL_SECS: u64 = 10 * 60;
const DEFAULT_DOCUMENT_TTL_SECS: u64 = 5 * 60;
const DEFAULT_LISTING_TTL_SECS: u64 = 2 * 60;
const DEFAULT_AUTHOR_TTL_SECS: u64 = 5 * 60;
const DEFAULT_FEED_PAGE_SIZE: usize = 10;

/// Cache configuration from `quire.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries across every kind.
    pub capacity: usize,
    /// Interval between background sweeps of expired entries.
    pub sweep_interval_secs: u64,
    /// Lifetime of cached user records.
    pub user_ttl_secs: u64,
    /// Lifetime of cached single documents.
    pub document_ttl_secs: u64,
    /// Lifetime of cached listings.
    pub listing_ttl_secs: u64,
    /// Lifetime of cached author views.
    pub author_ttl_secs: u64,
    /// Posts per feed page.
    pub feed_page_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            user_ttl_secs: DEFAULT_USER_TTL_SECS,
            document_ttl_secs: DEFAULT_DOCUMENT_TTL_SECS,
            listing_ttl_secs: DEFAULT_LISTING_TTL_SECS,
            author_ttl_secs: DEFAULT_AUTHOR_TTL_SECS,
            feed_page_size: DEFAULT_FEED_PAGE_SIZE,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the feed page size, clamping to 1 if zero.
    pub fn feed_page_size_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.feed_page_size).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Default lifetime for entries of the given kind.
    pub fn ttl_for(&self, kind: EntityKind) -> Duration {
        let secs = match kind {
            EntityKind::User => self.user_ttl_secs,
            EntityKind::Document => self.document_ttl_secs,
            EntityKind::Listing => self.listing_ttl_secs,
            EntityKind::Author => self.author_ttl_secs,
        };
        Duration::from_secs(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, 100);
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
        assert_eq!(config.ttl_for(EntityKind::User), Duration::from_secs(600));
        assert_eq!(config.ttl_for(EntityKind::Listing), Duration::from_secs(120));
        assert_eq!(config.ttl_for(EntityKind::Author), Duration::from_secs(300));
        assert_eq!(config.feed_page_size, 10);
    }

    #[test]
    fn listings_expire_before_users() {
        let config = CacheConfig::default();
        assert!(config.ttl_for(EntityKind::Listing) < config.ttl_for(EntityKind::Document));
        assert!(config.ttl_for(EntityKind::Document) < config.ttl_for(EntityKind::User));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            feed_page_size: 0,
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
        assert_eq!(config.feed_page_size_non_zero().get(), 1);
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "capacity": 8, "user_ttl_secs": 30 }"#).expect("parse");
        assert_eq!(config.capacity, 8);
        assert_eq!(config.ttl_for(EntityKind::User), Duration::from_secs(30));
        assert_eq!(config.listing_ttl_secs, 120);
    }
}
