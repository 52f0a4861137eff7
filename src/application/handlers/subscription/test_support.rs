//! Shared fixtures for subscription handler tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::adapters::store::InMemoryDocumentStore;
use crate::adapters::subscription::{DocumentSubscriptionStore, DocumentUserAccounts};
use crate::application::RetryPolicy;
use crate::domain::foundation::{CreatorId, UserId};
use crate::domain::subscription::TierRegistry;
use crate::ports::{DocumentPath, DocumentStore, FieldPatch, StoreError, StoredDocument};

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

pub fn creator(id: &str) -> CreatorId {
    CreatorId::new(id).unwrap()
}

/// Standard tiers with prices on everything except `creator-vip`.
pub fn priced_tiers() -> TierRegistry {
    TierRegistry::standard()
        .with_price("premium-monthly", Some("price_premium_monthly".to_string()))
        .with_price("premium-yearly", Some("price_premium_yearly".to_string()))
        .with_price("creator-basic", Some("price_creator_basic".to_string()))
        .with_price("creator-pro", Some("price_creator_pro".to_string()))
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(200))
}

/// Document store that fails queued writes once each, then behaves normally.
///
/// A queued entry names a collection and how many writes to it to let
/// through first; the write after those fails with a backend error and the
/// entry is consumed.
pub struct FlakyDocumentStore {
    inner: Arc<InMemoryDocumentStore>,
    failures: Mutex<Vec<(String, usize)>>,
}

impl FlakyDocumentStore {
    pub fn new(inner: Arc<InMemoryDocumentStore>) -> Self {
        Self {
            inner,
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_next_write(&self, collection: &str) {
        self.fail_write_after(collection, 0);
    }

    pub fn fail_write_after(&self, collection: &str, skip: usize) {
        self.failures.lock().unwrap().push((collection.to_string(), skip));
    }

    fn check(&self, path: &DocumentPath) -> Result<(), StoreError> {
        let mut failures = self.failures.lock().unwrap();
        let Some(pos) = failures.iter().position(|(c, _)| *c == path.collection) else {
            return Ok(());
        };
        if failures[pos].1 > 0 {
            failures[pos].1 -= 1;
            return Ok(());
        }
        failures.remove(pos);
        Err(StoreError::backend(format!("injected failure writing {}", path)))
    }
}

#[async_trait]
impl DocumentStore for FlakyDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocumentPath, value: Value) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.set(path, value).await
    }

    async fn update(&self, path: &DocumentPath, patch: FieldPatch) -> Result<(), StoreError> {
        self.check(path)?;
        self.inner.update(path, patch).await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.query_by_field(collection, field, value).await
    }

    async fn scan_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError> {
        self.inner.scan_all(collection).await
    }
}

/// In-memory store, adapters over it, and the tier table.
///
/// The adapters write through a [`FlakyDocumentStore`] so tests can fail
/// single writes; `docs` is the store underneath.
pub struct Fixture {
    pub docs: Arc<InMemoryDocumentStore>,
    pub flaky: Arc<FlakyDocumentStore>,
    pub store: Arc<DocumentSubscriptionStore>,
    pub accounts: Arc<DocumentUserAccounts>,
    pub tiers: Arc<TierRegistry>,
}

impl Fixture {
    pub fn new() -> Self {
        let docs = Arc::new(InMemoryDocumentStore::new());
        let flaky = Arc::new(FlakyDocumentStore::new(docs.clone()));
        Self {
            store: Arc::new(DocumentSubscriptionStore::new(flaky.clone())),
            accounts: Arc::new(DocumentUserAccounts::new(flaky.clone())),
            tiers: Arc::new(priced_tiers()),
            flaky,
            docs,
        }
    }
}
