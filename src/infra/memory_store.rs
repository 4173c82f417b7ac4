//! In-process document store.
//!
//! Behaves like the hosted store for the subset of queries the crate issues:
//! equality filters, one order field, page limits and resume markers. Faults
//! can be injected per collection or per document.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::application::pagination::Position;
use crate::application::repos::{
    Direction, DocumentQuery, DocumentStore, OrderBy, QueryPage, StoreError, StoredDocument,
};
use crate::cache::{rw_read, rw_write};

const SOURCE: &str = "infra::memory_store";

type Collection = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct Faults {
    collections: HashSet<String>,
    documents: HashSet<(String, String)>,
}

#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    faults: RwLock<Faults>,
    gets: AtomicUsize,
    queries: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document under a known id.
    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        rw_write(&self.collections, SOURCE, "insert")
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
    }

    pub fn len(&self, collection: &str) -> usize {
        rw_read(&self.collections, SOURCE, "len")
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Make every operation on `collection` fail as unavailable.
    pub fn fail_collection(&self, collection: &str) {
        rw_write(&self.faults, SOURCE, "fail_collection")
            .collections
            .insert(collection.to_string());
    }

    /// Make reads of one document fail as unavailable.
    pub fn fail_document(&self, collection: &str, id: &str) {
        rw_write(&self.faults, SOURCE, "fail_document")
            .documents
            .insert((collection.to_string(), id.to_string()));
    }

    pub fn heal(&self) {
        let mut faults = rw_write(&self.faults, SOURCE, "heal");
        faults.collections.clear();
        faults.documents.clear();
    }

    /// Number of single-document reads served so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(AtomicOrdering::SeqCst)
    }

    /// Number of queries served so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    fn check_collection(&self, collection: &str) -> Result<(), StoreError> {
        if rw_read(&self.faults, SOURCE, "check")
            .collections
            .contains(collection)
        {
            return Err(StoreError::unavailable(format!(
                "collection `{collection}` is offline"
            )));
        }
        Ok(())
    }

    fn check_document(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_collection(collection)?;
        let key = (collection.to_string(), id.to_string());
        if rw_read(&self.faults, SOURCE, "check").documents.contains(&key) {
            return Err(StoreError::unavailable(format!(
                "document `{collection}/{id}` is offline"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create_document(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        self.check_collection(collection)?;
        let id = Uuid::new_v4().to_string();
        self.insert(collection, &id, data);
        debug!(collection, id = %id, "Document created");
        Ok(id)
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.gets.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_document(collection, id)?;
        Ok(rw_read(&self.collections, SOURCE, "get_document")
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<QueryPage, StoreError> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        self.check_collection(collection)?;

        let start_after = query.start_after.as_ref().map(Position::decode).transpose()?;

        let mut matched: Vec<StoredDocument> = {
            let collections = rw_read(&self.collections, SOURCE, "query_documents");
            collections
                .get(collection)
                .into_iter()
                .flat_map(|docs| docs.iter())
                .filter(|(_, data)| {
                    query
                        .filter
                        .iter()
                        .all(|filter| data.get(&filter.field) == Some(&filter.value))
                })
                .map(|(id, data)| StoredDocument::new(id.clone(), data.clone()))
                .collect()
        };

        let order = query.order.as_ref();
        matched.sort_by(|a, b| compare_documents(order, a, b));

        if let Some(position) = &start_after {
            matched.retain(|doc| compare_to_position(order, doc, position) == Ordering::Greater);
        }
        if let Some(limit) = query.page_size {
            matched.truncate(limit);
        }

        let last_marker = matched
            .last()
            .map(|doc| Position::new(sort_value(order, doc), doc.id.clone()).encode());

        debug!(collection, returned = matched.len(), "Query served");
        Ok(QueryPage {
            documents: matched,
            last_marker,
        })
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> Result<(), StoreError> {
        self.check_document(collection, id)?;
        let mut collections = rw_write(&self.collections, SOURCE, "update_document");
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        match (existing, patch) {
            (Value::Object(fields), Value::Object(changes)) => {
                fields.extend(changes);
            }
            (existing, replacement) => *existing = replacement,
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_document(collection, id)?;
        if let Some(docs) = rw_write(&self.collections, SOURCE, "delete_document").get_mut(collection)
        {
            docs.remove(id);
        }
        Ok(())
    }
}

fn sort_value(order: Option<&OrderBy>, doc: &StoredDocument) -> Value {
    order
        .and_then(|order| doc.data.get(&order.field))
        .cloned()
        .unwrap_or(Value::Null)
}

fn compare_documents(order: Option<&OrderBy>, a: &StoredDocument, b: &StoredDocument) -> Ordering {
    let ascending = compare_values(&sort_value(order, a), &sort_value(order, b))
        .then_with(|| a.id.cmp(&b.id));
    directed(order, ascending)
}

fn compare_to_position(order: Option<&OrderBy>, doc: &StoredDocument, position: &Position) -> Ordering {
    let ascending = compare_values(&sort_value(order, doc), position.sort_key())
        .then_with(|| doc.id.as_str().cmp(position.id()));
    directed(order, ascending)
}

fn directed(order: Option<&OrderBy>, ascending: Ordering) -> Ordering {
    match order.map(|order| order.direction) {
        Some(Direction::Descending) => ascending.reverse(),
        _ => ascending,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::repos::FieldFilter;

    fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new();
        for (id, user, day) in [("p1", "u1", 1), ("p2", "u2", 2), ("p3", "u1", 3), ("p4", "u1", 4)] {
            store.insert(
                "blogs",
                id,
                json!({ "userId": user, "createdAt": format!("2024-01-0{day}T00:00:00Z") }),
            );
        }
        store
    }

    fn ids(page: &QueryPage) -> Vec<&str> {
        page.documents.iter().map(|doc| doc.id.as_str()).collect()
    }

    #[tokio::test]
    async fn orders_filters_and_limits() {
        let store = seeded();
        let query = DocumentQuery::new()
            .filter(FieldFilter::equals("userId", "u1"))
            .order_by(OrderBy::descending("createdAt"))
            .limit(2);

        let page = store.query_documents("blogs", &query).await.expect("query");
        assert_eq!(ids(&page), vec!["p4", "p3"]);
        assert!(page.last_marker.is_some());
    }

    #[tokio::test]
    async fn start_after_resumes_past_marker() {
        let store = seeded();
        let first = DocumentQuery::new()
            .order_by(OrderBy::descending("createdAt"))
            .limit(3);
        let page = store.query_documents("blogs", &first).await.expect("first page");
        assert_eq!(ids(&page), vec!["p4", "p3", "p2"]);

        let next = first.clone().start_after(page.last_marker.clone());
        let page = store.query_documents("blogs", &next).await.expect("second page");
        assert_eq!(ids(&page), vec!["p1"]);

        let last = next.start_after(page.last_marker.clone());
        let page = store.query_documents("blogs", &last).await.expect("third page");
        assert!(page.documents.is_empty());
        assert!(page.last_marker.is_none());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = seeded();
        store
            .update_document("blogs", "p1", json!({ "title": "Hello" }))
            .await
            .expect("update");

        let doc = store.get_document("blogs", "p1").await.expect("get").expect("exists");
        assert_eq!(doc["title"], "Hello");
        assert_eq!(doc["userId"], "u1");

        let err = store
            .update_document("blogs", "missing", json!({}))
            .await
            .expect_err("missing document");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_and_delete() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .create_document("users", json!({ "firstName": "Ada" }))
            .await
            .expect("create");
        assert_eq!(store.len("users"), 1);

        store.delete_document("users", &id).await.expect("delete");
        assert!(store.get_document("users", &id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn injected_faults_surface_as_unavailable() {
        let store = seeded();
        store.fail_document("blogs", "p2");
        assert!(store.get_document("blogs", "p1").await.is_ok());
        assert!(matches!(
            store.get_document("blogs", "p2").await,
            Err(StoreError::Unavailable(_))
        ));

        store.fail_collection("blogs");
        assert!(store.query_documents("blogs", &DocumentQuery::new()).await.is_err());

        store.heal();
        assert!(store.get_document("blogs", "p2").await.is_ok());
        assert_eq!(store.get_count(), 3);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn malformed_marker_is_rejected() {
        let store = seeded();
        let query = DocumentQuery::new().start_after(Some(
            crate::application::pagination::Marker::new("%%%"),
        ));
        let err = store.query_documents("blogs", &query).await.expect_err("bad marker");
        assert!(matches!(err, StoreError::Pagination(_)));
    }
}
