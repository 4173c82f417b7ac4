//! Quire cache system
//!
//! In-process memoization of blog data fetched from the document store:
//!
//! - **Store**: bounded key→value map with per-entry expiry; the oldest
//!   insertion is evicted when full
//! - **Keys**: canonical `"{kind}:{id}:{params}"` strings
//! - **Facade**: typed access per entity kind with kind-specific lifetimes
//! - **Batch**: cache-first, concurrent resolution of id sets
//! - **Sweeper**: optional background removal of expired entries
//!
//! ## Configuration
//!
//! Cache behavior is controlled via the `[cache]` section of `quire.toml`:
//!
//! ```toml
//! [cache]
//! capacity = 100
//! sweep_interval_secs = 300
//! user_ttl_secs = 600
//! listing_ttl_secs = 120
//! # ... see config.rs for all options
//! ```

mod batch;
mod config;
mod facade;
mod keys;
mod lock;
mod store;
mod sweeper;

pub use batch::{BatchResolver, CachedEntity, Resolution};
pub use config::CacheConfig;
pub use facade::{CachedValue, DomainCache, ListingPage};
pub use keys::{CacheKey, EntityKind, KeyParams, make_key};
pub(crate) use lock::{mutex_lock, rw_read, rw_write};
pub use store::{CacheStats, CacheStore};
pub use sweeper::{SweepHandle, Sweeper};
