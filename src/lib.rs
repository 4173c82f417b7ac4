//! Quire: the data-access cache behind a document-store backed blog.
//!
//! The crate memoizes users, posts, listings and composite author views in a
//! bounded, TTL-aware [`cache::CacheStore`], resolves related entities in
//! deduplicated batches, and shapes how often callers hit the backing store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
