//! Collaborator traits for the hosted backend.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::application::pagination::{Marker, PaginationError};
use crate::domain::types::EffectiveType;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied for `{collection}`")]
    PermissionDenied { collection: String },
    #[error("document `{id}` not found in `{collection}`")]
    NotFound { collection: String, id: String },
    #[error("document store error: {0}")]
    Backend(String),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl StoreError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }

    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }

    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }
}

/// Equality filter on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filter: Vec<FieldFilter>,
    pub order: Option<OrderBy>,
    pub page_size: Option<usize>,
    pub start_after: Option<Marker>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filter.push(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn start_after(mut self, marker: Option<Marker>) -> Self {
        self.start_after = marker;
        self
    }
}

/// A document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

impl StoredDocument {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub documents: Vec<StoredDocument>,
    /// Resume point after the last document, if any were returned.
    pub last_marker: Option<Marker>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<QueryPage, StoreError>;

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<(), StoreError>;

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

pub trait NetworkQuality: Send + Sync {
    fn effective_type(&self) -> EffectiveType;
}
