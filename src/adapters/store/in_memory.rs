//! In-memory document store for tests and single-process development.
//!
//! Mirrors the behavior of the hosted store closely enough for the
//! subscription adapters: per-document atomic patches, equality queries only
//! on indexed fields, and full scans.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::ports::{DocumentPath, DocumentStore, FieldPatch, StoreError, StoredDocument};

use super::patch::apply_patch;

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// In-memory document store.
///
/// By default every field is queryable. Once [`with_index`](Self::with_index)
/// is called, only the registered `(collection, field)` pairs are, and
/// queries on anything else fail with `StoreError::IndexUnavailable`.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<Collections>>,
    indexes: Option<HashMap<String, HashSet<String>>>,
    fail_indexed_queries: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    scans: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts equality queries to registered fields.
    pub fn with_index(mut self, collection: &str, field: &str) -> Self {
        self.indexes
            .get_or_insert_with(HashMap::new)
            .entry(collection.to_string())
            .or_default()
            .insert(field.to_string());
        self
    }

    /// Makes every `query_by_field` call fail as if the index were missing.
    pub fn set_fail_indexed_queries(&self, fail: bool) {
        self.fail_indexed_queries.store(fail, Ordering::SeqCst);
    }

    /// Makes `get`, `query_by_field` and `scan_all` fail with a backend error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `update` fail with a backend error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `scan_all` calls served so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn is_indexed(&self, collection: &str, field: &str) -> bool {
        match &self.indexes {
            None => true,
            Some(indexes) => indexes
                .get(collection)
                .map(|fields| fields.contains(field))
                .unwrap_or(false),
        }
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected read failure"));
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        self.check_reads()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .cloned())
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut collections = self.collections.write().await;
        collections
            .entry(path.collection.clone())
            .or_default()
            .insert(path.id.clone(), value);
        Ok(())
    }

    async fn update(&self, path: &DocumentPath, patch: FieldPatch) -> Result<(), StoreError> {
        self.check_writes()?;
        let mut collections = self.collections.write().await;
        let doc = collections
            .entry(path.collection.clone())
            .or_default()
            .entry(path.id.clone())
            .or_insert(Value::Null);
        apply_patch(doc, &patch);
        Ok(())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.check_reads()?;
        if self.fail_indexed_queries.load(Ordering::SeqCst) || !self.is_indexed(collection, field)
        {
            return Err(StoreError::index_unavailable(collection, field));
        }

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, body)| body.get(field) == Some(value))
                    .map(|(id, body)| StoredDocument {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scan_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        self.check_reads()?;
        self.scans.fetch_add(1, Ordering::SeqCst);

        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, body)| StoredDocument {
                        id: id.clone(),
                        body: body.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
