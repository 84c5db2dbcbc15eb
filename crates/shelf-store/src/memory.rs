//! In-process document store
//!
//! `MemoryStore` keeps every collection in memory behind a `RwLock` and
//! executes pipelines with the local evaluator. It backs the CLI (datasets
//! exported as extended JSON) and the test suites, and supports per-collection
//! failure injection to exercise data-access error paths.

use crate::error::{StoreError, StoreResult};
use crate::eval::{self, Snapshot};
use crate::pipeline::Pipeline;
use crate::store::{Collection, DocumentStore};
use crate::value::Document;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::{debug, warn};

/// In-memory [`DocumentStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Snapshot>,
    failing: RwLock<HashSet<Collection>>,
}

impl MemoryStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style bulk insert
    #[must_use]
    pub fn with_documents(self, collection: Collection, docs: impl IntoIterator<Item = Document>) -> Self {
        self.insert_many(collection, docs);
        self
    }

    /// Insert one document
    pub fn insert(&self, collection: Collection, doc: Document) {
        self.collections.write().entry(collection).or_default().push(doc);
    }

    /// Insert documents in order
    pub fn insert_many(&self, collection: Collection, docs: impl IntoIterator<Item = Document>) {
        self.collections
            .write()
            .entry(collection)
            .or_default()
            .extend(docs);
    }

    /// Number of documents in collection
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.collections.read().get(&collection).map_or(0, Vec::len)
    }

    /// Check whether every collection is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.read().values().all(Vec::is_empty)
    }

    /// Make every operation on collection fail with `StoreError::Unavailable`
    pub fn fail_collection(&self, collection: Collection) {
        self.failing.write().insert(collection);
    }

    /// Undo [`MemoryStore::fail_collection`]
    pub fn restore_collection(&self, collection: Collection) {
        self.failing.write().remove(&collection);
    }

    /// Load a dataset object `{ "<collection>": [<document>, ...], ... }`
    ///
    /// Documents are MongoDB extended JSON. Unknown collection names are
    /// skipped with a warning.
    ///
    /// # Errors
    /// `StoreError::ExtendedJson` when the dataset is not an object of arrays
    /// or a document is malformed
    pub fn from_extended_json(dataset: serde_json::Value) -> StoreResult<Self> {
        let serde_json::Value::Object(map) = dataset else {
            return Err(StoreError::ExtendedJson(
                "dataset must be an object keyed by collection".into(),
            ));
        };

        let store = Self::new();
        for (name, docs) in map {
            let Some(collection) = Collection::from_name(&name) else {
                warn!(collection = %name, "Skipping unknown collection in dataset");
                continue;
            };
            let serde_json::Value::Array(items) = docs else {
                return Err(StoreError::ExtendedJson(format!(
                    "collection '{name}' must be an array"
                )));
            };
            let parsed = items
                .into_iter()
                .map(Document::from_extended_json)
                .collect::<StoreResult<Vec<_>>>()?;
            store.insert_many(collection, parsed);
        }
        Ok(store)
    }

    /// Parse and load a dataset from text
    ///
    /// # Errors
    /// `StoreError::ExtendedJson` for invalid JSON or malformed documents
    pub fn from_extended_json_str(text: &str) -> StoreResult<Self> {
        let json = serde_json::from_str(text)
            .map_err(|e| StoreError::ExtendedJson(format!("invalid dataset json: {e}")))?;
        Self::from_extended_json(json)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn aggregate(
        &self,
        collection: Collection,
        pipeline: &Pipeline,
    ) -> StoreResult<Vec<Document>> {
        if self.failing.read().contains(&collection) {
            return Err(StoreError::Unavailable(format!(
                "collection '{collection}' is unavailable"
            )));
        }

        let snapshot = self.collections.read();
        let input = snapshot.get(&collection).cloned().unwrap_or_default();
        let rows = eval::execute(input, pipeline.stages(), &snapshot)?;
        debug!(
            collection = %collection,
            stages = pipeline.len(),
            rows = rows.len(),
            "Pipeline executed"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::predicate::Predicate;
    use crate::store::FindOptions;
    use crate::pipeline::SortOrder;

    fn seeded() -> MemoryStore {
        MemoryStore::new().with_documents(
            Collection::Products,
            vec![
                doc! { "name" => "Milk", "stockQuantity" => 4 },
                doc! { "name" => "Bread", "stockQuantity" => 1 },
                doc! { "name" => "Eggs", "stockQuantity" => 9 },
            ],
        )
    }

    #[tokio::test]
    async fn count_and_find() {
        let store = seeded();
        assert_eq!(store.count(Collection::Products, &Predicate::All).await.unwrap(), 3);
        assert_eq!(store.count(Collection::Orders, &Predicate::All).await.unwrap(), 0);

        let options = FindOptions::new()
            .with_sort("stockQuantity", SortOrder::Ascending)
            .with_limit(2);
        let rows = store
            .find(Collection::Products, &Predicate::All, &options)
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().filter_map(|d| d.get_str("name")).collect();
        assert_eq!(names, vec!["Bread", "Milk"]);
    }

    #[tokio::test]
    async fn find_one_returns_first_match() {
        let store = seeded();
        let found = store
            .find_one(Collection::Products, &Predicate::eq("name", "Eggs"))
            .await
            .unwrap();
        assert_eq!(found.and_then(|d| d.get_i64("stockQuantity")), Some(9));
    }

    #[tokio::test]
    async fn failure_injection() {
        let store = seeded();
        store.fail_collection(Collection::Products);
        let err = store
            .count(Collection::Products, &Predicate::All)
            .await
            .unwrap_err();
        assert!(err.is_backend());
        store.restore_collection(Collection::Products);
        assert!(store.count(Collection::Products, &Predicate::All).await.is_ok());
    }

    #[test]
    fn loads_extended_json_dataset() {
        let store = MemoryStore::from_extended_json_str(
            r#"{
                "products": [{ "_id": { "$oid": "64b7f0c2a1b2c3d4e5f60718" }, "name": "Tea" }],
                "wishlists": [{}]
            }"#,
        )
        .unwrap();
        assert_eq!(store.len(Collection::Products), 1);
        assert!(!store.is_empty());
    }

    #[test]
    fn rejects_non_array_collection() {
        let err = MemoryStore::from_extended_json(serde_json::json!({ "orders": {} }));
        assert!(err.is_err());
    }
}
