//! Cache key definitions.
//!
//! Every cached value lives under `"{kind}:{id}:{params}"`, where `params` is
//! the sorted-key JSON rendering of the request parameters (empty when there
//! are none). Equal logical requests always produce the same key.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};

/// Namespace of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A single user record.
    User,
    /// A single blog post.
    Document,
    /// A list of posts (feed pages, per-user lists).
    Listing,
    /// Composite view embedding a user and their posts.
    Author,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Document => "document",
            EntityKind::Listing => "listing",
            EntityKind::Author => "author",
        }
    }

    /// Substring shared by every key of this kind.
    pub fn namespace(self) -> String {
        format!("{}:", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request parameters folded into a key.
///
/// Backed by an ordered map so insertion order never changes the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyParams(BTreeMap<String, Value>);

impl KeyParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sorted-key JSON, or an empty string when there are no parameters.
    pub fn canonical(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let object: Map<String, Value> = self
            .0
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Value::Object(object).to_string()
    }
}

/// Fully-qualified cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.0.contains(pattern)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Build the key for `(kind, id, params)`.
pub fn make_key(kind: EntityKind, id: &str, params: &KeyParams) -> CacheKey {
    CacheKey(format!("{}:{}:{}", kind.as_str(), id, params.canonical()))
}
