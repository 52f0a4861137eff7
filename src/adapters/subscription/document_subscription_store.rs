//! Subscription store over a [`DocumentStore`].
//!
//! Equality queries are attempted first. When the backing store reports the
//! index as unavailable the adapter fetches the whole collection and filters
//! in memory, so correctness never depends on an index existing.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::domain::foundation::{CreatorId, PaymentId, SubscriptionId, UserId};
use crate::domain::subscription::{
    CreatorSubscription, PlatformSubscription, SubscriptionKind, SubscriptionPayment,
};
use crate::ports::{
    DocumentPath, DocumentStore, FieldPatch, PaymentRecordOutcome, StoreError, StoredDocument,
    SubscriptionPatch, SubscriptionStore,
};

use super::documents::{
    collection_for, CreatorDocument, PaymentDocument, PlatformDocument, CREATOR_COLLECTION,
    FIELD_EXTERNAL_ID, FIELD_SUBSCRIBER_ID, FIELD_USER_ID, FIELD_USER_ID_UPPER,
    PAYMENT_COLLECTION, PLATFORM_COLLECTION,
};

/// Subscription store adapter.
pub struct DocumentSubscriptionStore {
    store: Arc<dyn DocumentStore>,
}

impl DocumentSubscriptionStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Indexed query on the first available field, falling back to a full
    /// scan when none of them is indexed. The caller filters the result.
    async fn query_or_scan(
        &self,
        collection: &str,
        fields: &[&str],
        value: &str,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let needle = Value::String(value.to_string());
        let mut found = Vec::new();
        let mut any_unindexed = false;

        for field in fields {
            match self.store.query_by_field(collection, field, &needle).await {
                Ok(docs) if !docs.is_empty() => return Ok(docs),
                Ok(docs) => found = docs,
                Err(err) if err.is_index_unavailable() => {
                    tracing::debug!(collection, field, "Index unavailable, trying next strategy");
                    any_unindexed = true;
                }
                Err(err) => return Err(err),
            }
        }

        if any_unindexed {
            tracing::info!(collection, "Falling back to full collection scan");
            return self.store.scan_all(collection).await;
        }
        Ok(found)
    }

    async fn platform_rows(
        &self,
        fields: &[&str],
        value: &str,
    ) -> Result<Vec<PlatformSubscription>, StoreError> {
        let docs = self.query_or_scan(PLATFORM_COLLECTION, fields, value).await?;
        Ok(decode_all::<PlatformDocument>(PLATFORM_COLLECTION, docs)
            .into_iter()
            .filter(|(_, doc)| doc.is_platform())
            .filter_map(|(id, doc)| decode_logged(PLATFORM_COLLECTION, &id, doc.into_domain(&id)))
            .collect())
    }

    async fn creator_rows(
        &self,
        field: &str,
        value: &str,
    ) -> Result<Vec<CreatorSubscription>, StoreError> {
        let docs = self.query_or_scan(CREATOR_COLLECTION, &[field], value).await?;
        Ok(decode_all::<CreatorDocument>(CREATOR_COLLECTION, docs)
            .into_iter()
            .filter_map(|(id, doc)| decode_logged(CREATOR_COLLECTION, &id, doc.into_domain(&id)))
            .collect())
    }
}

fn decode_all<T: DeserializeOwned>(collection: &str, docs: Vec<StoredDocument>) -> Vec<(String, T)> {
    docs.into_iter()
        .filter_map(|doc| match serde_json::from_value::<T>(doc.body) {
            Ok(decoded) => Some((doc.id, decoded)),
            Err(err) => {
                tracing::warn!(collection, doc_id = %doc.id, error = %err, "Skipping undecodable document");
                None
            }
        })
        .collect()
}

fn decode_logged<T>(collection: &str, doc_id: &str, result: Result<T, StoreError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(collection, doc_id, error = %err, "Skipping invalid subscription row");
            None
        }
    }
}

fn patch_fields(patch: &SubscriptionPatch) -> Result<FieldPatch, StoreError> {
    let mut fields = FieldPatch::new();
    if let Some(status) = patch.status {
        fields.insert("status".to_string(), serde_json::to_value(status)?);
    }
    if let Some(end_date) = patch.end_date {
        fields.insert("endDate".to_string(), serde_json::to_value(end_date)?);
    }
    if let Some(auto_renew) = patch.auto_renew {
        fields.insert("autoRenew".to_string(), json!(auto_renew));
    }
    if let Some(payment_status) = patch.payment_status {
        fields.insert("paymentStatus".to_string(), serde_json::to_value(payment_status)?);
    }
    if let Some(updated_at) = patch.updated_at {
        fields.insert("updatedAt".to_string(), serde_json::to_value(updated_at)?);
    }
    Ok(fields)
}

#[async_trait]
impl SubscriptionStore for DocumentSubscriptionStore {
    async fn active_platform_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PlatformSubscription>, StoreError> {
        let active = self.active_platform_subscriptions(user_id).await?;
        if active.len() > 1 {
            tracing::warn!(
                user_id = %user_id,
                count = active.len(),
                "Multiple active platform subscriptions, using the newest"
            );
        }
        Ok(active
            .into_iter()
            .max_by_key(|sub| sub.lifecycle.created_at))
    }

    async fn active_platform_subscriptions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PlatformSubscription>, StoreError> {
        let rows = self
            .platform_rows(&[FIELD_USER_ID_UPPER, FIELD_USER_ID], user_id.as_str())
            .await?;
        Ok(rows
            .into_iter()
            .filter(|sub| sub.user_id == *user_id && sub.is_active())
            .collect())
    }

    async fn active_creator_subscription(
        &self,
        subscriber_id: &UserId,
        creator_id: &CreatorId,
    ) -> Result<Option<CreatorSubscription>, StoreError> {
        let active = self.active_creator_subscriptions(subscriber_id).await?;
        Ok(active
            .into_iter()
            .filter(|sub| sub.creator_id == *creator_id)
            .max_by_key(|sub| sub.lifecycle.created_at))
    }

    async fn active_creator_subscriptions(
        &self,
        subscriber_id: &UserId,
    ) -> Result<Vec<CreatorSubscription>, StoreError> {
        let rows = self
            .creator_rows(FIELD_SUBSCRIBER_ID, subscriber_id.as_str())
            .await?;
        Ok(rows
            .into_iter()
            .filter(|sub| sub.subscriber_id == *subscriber_id && sub.is_active())
            .collect())
    }

    async fn platform_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<PlatformSubscription>, StoreError> {
        let rows = self
            .platform_rows(&[FIELD_EXTERNAL_ID], external_subscription_id)
            .await?;
        Ok(rows
            .into_iter()
            .filter(|sub| sub.lifecycle.external_subscription_id == external_subscription_id)
            .max_by_key(|sub| sub.lifecycle.created_at))
    }

    async fn creator_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<CreatorSubscription>, StoreError> {
        let rows = self
            .creator_rows(FIELD_EXTERNAL_ID, external_subscription_id)
            .await?;
        Ok(rows
            .into_iter()
            .filter(|sub| sub.lifecycle.external_subscription_id == external_subscription_id)
            .max_by_key(|sub| sub.lifecycle.created_at))
    }

    async fn upsert_platform(&self, subscription: &PlatformSubscription) -> Result<(), StoreError> {
        let path = DocumentPath::new(PLATFORM_COLLECTION, subscription.id.to_string());
        let body = serde_json::to_value(PlatformDocument::from_domain(subscription))?;
        self.store.set(&path, body).await
    }

    async fn upsert_creator(&self, subscription: &CreatorSubscription) -> Result<(), StoreError> {
        let path = DocumentPath::new(CREATOR_COLLECTION, subscription.id.to_string());
        let body = serde_json::to_value(CreatorDocument::from_domain(subscription))?;
        self.store.set(&path, body).await
    }

    async fn update_fields(
        &self,
        kind: SubscriptionKind,
        id: &SubscriptionId,
        patch: SubscriptionPatch,
    ) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        let path = DocumentPath::new(collection_for(kind), id.to_string());
        self.store.update(&path, patch_fields(&patch)?).await
    }

    async fn platform_subscriber_ids(&self) -> Result<Vec<UserId>, StoreError> {
        let docs = self.store.scan_all(PLATFORM_COLLECTION).await?;
        let owners: BTreeSet<UserId> = decode_all::<PlatformDocument>(PLATFORM_COLLECTION, docs)
            .into_iter()
            .filter(|(_, doc)| doc.is_platform())
            .filter_map(|(_, doc)| doc.owner().and_then(|owner| UserId::new(owner).ok()))
            .collect();
        Ok(owners.into_iter().collect())
    }

    async fn record_payment(
        &self,
        payment: &SubscriptionPayment,
    ) -> Result<PaymentRecordOutcome, StoreError> {
        let path = DocumentPath::new(PAYMENT_COLLECTION, payment.id.to_string());
        if let Some(body) = self.store.get(&path).await? {
            let existing = serde_json::from_value::<PaymentDocument>(body)?.into_domain(&path.id)?;
            return Ok(if existing.applied {
                PaymentRecordOutcome::Duplicate
            } else {
                PaymentRecordOutcome::Pending(existing)
            });
        }

        let body = serde_json::to_value(PaymentDocument::from_domain(payment))?;
        self.store.set(&path, body).await?;
        Ok(PaymentRecordOutcome::Recorded)
    }

    async fn mark_payment_applied(&self, id: &PaymentId) -> Result<(), StoreError> {
        let mut patch = FieldPatch::new();
        patch.insert("applied".to_string(), json!(true));
        self.store
            .update(&DocumentPath::new(PAYMENT_COLLECTION, id.to_string()), patch)
            .await
    }
}

impl std::fmt::Debug for DocumentSubscriptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSubscriptionStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::InMemoryDocumentStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::{PaymentStatus, SubscriptionStatus};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn creator(id: &str) -> CreatorId {
        CreatorId::new(id).unwrap()
    }

    fn setup(docs: InMemoryDocumentStore) -> (Arc<InMemoryDocumentStore>, DocumentSubscriptionStore) {
        let docs = Arc::new(docs);
        let store = DocumentSubscriptionStore::new(docs.clone());
        (docs, store)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Platform lookups
    // ══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn finds_active_platform_row_by_index() {
        let (docs, store) = setup(InMemoryDocumentStore::new());
        let sub = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", "sub_1", 1);
        store.upsert_platform(&sub).await.unwrap();

        let found = store.active_platform_subscription(&user("u1")).await.unwrap();
        assert_eq!(found, Some(sub));
        assert_eq!(docs.scan_count(), 0);
    }

    #[tokio::test]
    async fn falls_back_to_scan_when_indexes_are_unavailable() {
        let (docs, store) = setup(InMemoryDocumentStore::new());
        let sub = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", "sub_1", 1);
        store.upsert_platform(&sub).await.unwrap();
        docs.set_fail_indexed_queries(true);

        let found = store.active_platform_subscription(&user("u1")).await.unwrap();
        assert_eq!(found, Some(sub));
        assert_eq!(docs.scan_count(), 1);
    }

    #[tokio::test]
    async fn second_owner_field_index_is_tried_before_scanning() {
        let (docs, store) = setup(InMemoryDocumentStore::new().with_index(PLATFORM_COLLECTION, "userId"));
        let sub = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", "sub_1", 1);
        store.upsert_platform(&sub).await.unwrap();

        let found = store.active_platform_subscription(&user("u1")).await.unwrap();
        assert_eq!(found, Some(sub));
        assert_eq!(docs.scan_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_rows_are_not_active() {
        let (_, store) = setup(InMemoryDocumentStore::new());
        let sub = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", "sub_1", 1);
        store.upsert_platform(&sub).await.unwrap();
        store
            .update_fields(
                SubscriptionKind::Platform,
                &sub.id,
                SubscriptionPatch {
                    status: Some(SubscriptionStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(store.active_platform_subscription(&user("u1")).await.unwrap(), None);
        let by_external = store
            .platform_subscription_by_external_id("sub_1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_external.lifecycle.status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn newest_active_row_wins_when_several_exist() {
        let (_, store) = setup(InMemoryDocumentStore::new());
        let mut older = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", "sub_1", 1);
        older.lifecycle.created_at = Timestamp::now().add_days(-10);
        let newer = PlatformSubscription::from_checkout(user("u1"), "premium-yearly", "sub_2", 12);
        store.upsert_platform(&older).await.unwrap();
        store.upsert_platform(&newer).await.unwrap();

        let found = store.active_platform_subscription(&user("u1")).await.unwrap().unwrap();
        assert_eq!(found.id, newer.id);
        assert_eq!(store.active_platform_subscriptions(&user("u1")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn non_index_errors_propagate() {
        let (docs, store) = setup(InMemoryDocumentStore::new());
        docs.set_fail_reads(true);
        assert!(store.active_platform_subscription(&user("u1")).await.is_err());
    }

    // ══════════════════════════════════════════════════════════════════════
    // Creator lookups
    // ══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creator_lookup_filters_by_creator() {
        let (docs, store) = setup(InMemoryDocumentStore::new());
        let a = CreatorSubscription::from_checkout(user("fan"), creator("c1"), "creator-pro", "sub_a", 1);
        let b = CreatorSubscription::from_checkout(user("fan"), creator("c2"), "creator-basic", "sub_b", 1);
        store.upsert_creator(&a).await.unwrap();
        store.upsert_creator(&b).await.unwrap();
        docs.set_fail_indexed_queries(true);

        let found = store
            .active_creator_subscription(&user("fan"), &creator("c2"))
            .await
            .unwrap();
        assert_eq!(found, Some(b));
        assert_eq!(store.active_creator_subscriptions(&user("fan")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn creator_lookup_by_external_id() {
        let (_, store) = setup(InMemoryDocumentStore::new());
        let sub = CreatorSubscription::from_checkout(user("fan"), creator("c1"), "creator-pro", "sub_a", 1);
        store.upsert_creator(&sub).await.unwrap();

        assert_eq!(
            store.creator_subscription_by_external_id("sub_a").await.unwrap(),
            Some(sub)
        );
        assert_eq!(store.creator_subscription_by_external_id("sub_x").await.unwrap(), None);
    }

    // ══════════════════════════════════════════════════════════════════════
    // Writes
    // ══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn update_fields_only_touches_patched_fields() {
        let (_, store) = setup(InMemoryDocumentStore::new());
        let sub = CreatorSubscription::from_checkout(user("fan"), creator("c1"), "creator-pro", "sub_a", 1);
        store.upsert_creator(&sub).await.unwrap();

        store
            .update_fields(
                SubscriptionKind::Creator,
                &sub.id,
                SubscriptionPatch {
                    payment_status: Some(PaymentStatus::Failed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let found = store.creator_subscription_by_external_id("sub_a").await.unwrap().unwrap();
        assert_eq!(found.lifecycle.payment_status, PaymentStatus::Failed);
        assert_eq!(found.lifecycle.status, SubscriptionStatus::Active);
        assert_eq!(found.tier_id, "creator-pro");
    }

    #[tokio::test]
    async fn payment_ledger_deduplicates_on_external_id() {
        let (docs, store) = setup(InMemoryDocumentStore::new());
        let sub_id = SubscriptionId::new();
        let first = SubscriptionPayment::paid(sub_id, "in_1", 999, "usd");
        let again = SubscriptionPayment::paid(sub_id, "in_1", 999, "usd");

        assert_eq!(store.record_payment(&first).await.unwrap(), PaymentRecordOutcome::Recorded);
        store.mark_payment_applied(&first.id).await.unwrap();
        assert_eq!(store.record_payment(&again).await.unwrap(), PaymentRecordOutcome::Duplicate);
        assert_eq!(docs.count(PAYMENT_COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn unapplied_payment_is_returned_for_resuming() {
        let (docs, store) = setup(InMemoryDocumentStore::new());
        let until = Timestamp::now().add_months(1);
        let first = SubscriptionPayment::paid(SubscriptionId::new(), "in_1", 999, "usd")
            .with_period_end(Some(until));
        store.record_payment(&first).await.unwrap();

        let again = SubscriptionPayment::paid(first.subscription_id, "in_1", 999, "usd");
        match store.record_payment(&again).await.unwrap() {
            PaymentRecordOutcome::Pending(stored) => {
                assert_eq!(stored.id, first.id);
                assert_eq!(stored.period_end, Some(until));
                assert!(!stored.applied);
            }
            other => panic!("expected pending payment, got {:?}", other),
        }
        assert_eq!(docs.count(PAYMENT_COLLECTION).await, 1);
    }

    #[tokio::test]
    async fn subscriber_ids_are_distinct_across_rows() {
        let (_, store) = setup(InMemoryDocumentStore::new());
        for ext in ["sub_1", "sub_2"] {
            let sub = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", ext, 1);
            store.upsert_platform(&sub).await.unwrap();
        }
        let other = PlatformSubscription::from_checkout(user("u2"), "premium-monthly", "sub_3", 1);
        store.upsert_platform(&other).await.unwrap();

        let ids = store.platform_subscriber_ids().await.unwrap();
        assert_eq!(ids, vec![user("u1"), user("u2")]);
    }

    #[tokio::test]
    async fn undecodable_rows_are_skipped() {
        let (docs, store) = setup(InMemoryDocumentStore::new());
        docs.set(
            &DocumentPath::new(PLATFORM_COLLECTION, "junk"),
            json!({ "userID": "u1", "status": "weird" }),
        )
        .await
        .unwrap();

        assert_eq!(store.active_platform_subscription(&user("u1")).await.unwrap(), None);
    }
}
