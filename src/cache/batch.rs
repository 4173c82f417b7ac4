//! Cache-first resolution of many entities by id.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{debug, warn};

use super::facade::DomainCache;
use crate::domain::entities::{BlogPost, User};

pub(crate) const METRIC_FALLBACK: &str = "quire_batch_fallback_total";
pub(crate) const METRIC_RESOLVE_MS: &str = "quire_batch_resolve_ms";

/// An entity the batch resolver can look up, remember and stand in for.
pub trait CachedEntity: Clone + Send + 'static {
    fn cached(cache: &DomainCache, id: &str) -> Option<Self>;

    fn remember(cache: &DomainCache, id: &str, value: &Self);

    /// Stand-in returned when `id` cannot be fetched.
    fn placeholder(id: &str) -> Self;
}

impl CachedEntity for User {
    fn cached(cache: &DomainCache, id: &str) -> Option<Self> {
        cache.get_user(id)
    }

    fn remember(cache: &DomainCache, id: &str, value: &Self) {
        cache.put_user(id, value.clone());
    }

    fn placeholder(id: &str) -> Self {
        User::unknown(id)
    }
}

impl CachedEntity for BlogPost {
    fn cached(cache: &DomainCache, id: &str) -> Option<Self> {
        cache.get_document(id)
    }

    fn remember(cache: &DomainCache, id: &str, value: &Self) {
        cache.put_document(id, value.clone(), None);
    }

    fn placeholder(id: &str) -> Self {
        BlogPost::missing(id)
    }
}

/// How a single id was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Cached(T),
    Fetched(T),
    Fallback { value: T, reason: String },
}

impl<T> Resolution<T> {
    pub fn value(&self) -> &T {
        match self {
            Resolution::Cached(value) | Resolution::Fetched(value) => value,
            Resolution::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Resolution::Cached(value) | Resolution::Fetched(value) => value,
            Resolution::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }
}

/// Resolves id sets against the cache, fetching misses concurrently.
#[derive(Clone)]
pub struct BatchResolver {
    cache: DomainCache,
}

impl BatchResolver {
    pub fn new(cache: DomainCache) -> Self {
        Self { cache }
    }

    /// Resolve every distinct id in `ids`.
    ///
    /// Cached ids are served without calling `fetch_one`; the rest are
    /// fetched together and the call returns only once all of them settled.
    /// A fetch that fails or finds nothing yields a placeholder, which is not
    /// cached.
    pub async fn resolve_many<T, I, F, Fut, E>(
        &self,
        ids: I,
        fetch_one: F,
    ) -> HashMap<String, Resolution<T>>
    where
        T: CachedEntity,
        I: IntoIterator,
        I::Item: AsRef<str>,
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
        E: std::fmt::Display,
    {
        let mut seen = HashSet::new();
        let mut resolved = HashMap::new();
        let mut misses = Vec::new();

        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id.to_string()) {
                continue;
            }
            match T::cached(&self.cache, id) {
                Some(value) => {
                    resolved.insert(id.to_string(), Resolution::Cached(value));
                }
                None => misses.push(id.to_string()),
            }
        }

        debug!(
            requested = seen.len(),
            cached = resolved.len(),
            fetching = misses.len(),
            "Resolving batch"
        );

        let started = Instant::now();
        let fetches = misses.iter().map(|id| fetch_one(id.clone()));
        let outcomes = join_all(fetches).await;
        histogram!(METRIC_RESOLVE_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        for (id, outcome) in misses.into_iter().zip(outcomes) {
            let resolution = match outcome {
                Ok(Some(value)) => {
                    T::remember(&self.cache, &id, &value);
                    Resolution::Fetched(value)
                }
                Ok(None) => {
                    warn!(id = %id, "Batch entity not found; using placeholder");
                    Resolution::Fallback {
                        value: T::placeholder(&id),
                        reason: "not found".to_string(),
                    }
                }
                Err(err) => {
                    warn!(id = %id, error = %err, "Batch fetch failed; using placeholder");
                    Resolution::Fallback {
                        value: T::placeholder(&id),
                        reason: err.to_string(),
                    }
                }
            };
            if resolution.is_fallback() {
                counter!(METRIC_FALLBACK).increment(1);
            }
            resolved.insert(id, resolution);
        }

        resolved
    }
}
