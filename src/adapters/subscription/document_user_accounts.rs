//! User entitlement fields stored on `users/{id}` documents.
//!
//! Counter updates are read-modify-write against a single document. Each
//! one also records what it counted (`subscriberLedger/{subscriptionId}`,
//! `creditedPayments/{paymentId}`) in the same patch, so a redelivered
//! event never counts twice. Two concurrent events for the same creator can
//! still race; the store offers no compare-and-set.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::foundation::{CreatorId, PaymentId, SubscriptionId, UserId};
use crate::domain::subscription::CreatorProfile;
use crate::ports::{DocumentPath, DocumentStore, FieldPatch, StoreError, UserAccount, UserAccounts};

pub const USERS_COLLECTION: &str = "users";

const SUBSCRIBER_LEDGER: &str = "subscriberLedger";
const CREDITED_PAYMENTS: &str = "creditedPayments";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(default)]
    is_premium: bool,
    #[serde(default)]
    is_creator: bool,
    #[serde(default)]
    creator_profile: Option<CreatorProfile>,
    #[serde(default)]
    subscriber_ledger: BTreeMap<String, Value>,
    #[serde(default)]
    credited_payments: BTreeMap<String, Value>,
}

/// [`UserAccounts`] over a [`DocumentStore`].
pub struct DocumentUserAccounts {
    store: Arc<dyn DocumentStore>,
}

impl DocumentUserAccounts {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn path(user_id: &str) -> DocumentPath {
        DocumentPath::new(USERS_COLLECTION, user_id)
    }

    async fn load(&self, user_id: &str) -> Result<Option<UserDocument>, StoreError> {
        match self.store.get(&Self::path(user_id)).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    /// The creator's document, with an empty profile when none exists yet.
    async fn load_creator(&self, creator_id: &CreatorId) -> Result<(UserDocument, CreatorProfile), StoreError> {
        let doc = self.load(creator_id.as_str()).await?.unwrap_or_default();
        let profile = match doc.creator_profile {
            Some(profile) => profile,
            None => {
                tracing::info!(creator_id = %creator_id, "Creator profile missing, starting from zero");
                CreatorProfile::default()
            }
        };
        Ok((doc, profile))
    }

    fn profile_patch(profile: CreatorProfile) -> FieldPatch {
        let mut patch = FieldPatch::new();
        patch.insert(
            "creatorProfile/subscriberCount".to_string(),
            json!(profile.subscriber_count),
        );
        patch.insert(
            "creatorProfile/totalEarnings".to_string(),
            json!(profile.total_earnings),
        );
        patch
    }

    async fn write(&self, creator_id: &CreatorId, patch: FieldPatch) -> Result<(), StoreError> {
        self.store.update(&Self::path(creator_id.as_str()), patch).await
    }
}

fn marker(map: &str, key: impl std::fmt::Display) -> String {
    format!("{}/{}", map, key)
}

#[async_trait]
impl UserAccounts for DocumentUserAccounts {
    async fn account(&self, user_id: &UserId) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.load(user_id.as_str()).await?.map(|doc| UserAccount {
            is_premium: doc.is_premium,
            is_creator: doc.is_creator,
            creator_profile: doc.creator_profile,
        }))
    }

    async fn set_premium(&self, user_id: &UserId, is_premium: bool) -> Result<(), StoreError> {
        let mut patch = FieldPatch::new();
        patch.insert("isPremium".to_string(), json!(is_premium));
        self.store.update(&Self::path(user_id.as_str()), patch).await
    }

    async fn count_subscriber(
        &self,
        creator_id: &CreatorId,
        subscription: &SubscriptionId,
    ) -> Result<CreatorProfile, StoreError> {
        let (doc, current) = self.load_creator(creator_id).await?;
        if doc.subscriber_ledger.contains_key(&subscription.to_string()) {
            return Ok(current);
        }

        let profile = current.with_subscriber_delta(1);
        let mut patch = Self::profile_patch(profile);
        patch.insert(marker(SUBSCRIBER_LEDGER, subscription), json!(true));
        self.write(creator_id, patch).await?;
        Ok(profile)
    }

    async fn release_subscriber(
        &self,
        creator_id: &CreatorId,
        subscription: &SubscriptionId,
    ) -> Result<CreatorProfile, StoreError> {
        let (doc, current) = self.load_creator(creator_id).await?;
        if !doc.subscriber_ledger.contains_key(&subscription.to_string()) {
            return Ok(current);
        }

        let profile = current.with_subscriber_delta(-1);
        let mut patch = Self::profile_patch(profile);
        patch.insert(marker(SUBSCRIBER_LEDGER, subscription), Value::Null);
        self.write(creator_id, patch).await?;
        Ok(profile)
    }

    async fn credit_earnings(
        &self,
        creator_id: &CreatorId,
        payment: &PaymentId,
        amount: f64,
    ) -> Result<CreatorProfile, StoreError> {
        let (doc, current) = self.load_creator(creator_id).await?;
        if doc.credited_payments.contains_key(&payment.to_string()) {
            return Ok(current);
        }

        let profile = current.with_credit(amount);
        if profile != current {
            let mut patch = Self::profile_patch(profile);
            patch.insert(marker(CREDITED_PAYMENTS, payment), json!(true));
            self.write(creator_id, patch).await?;
        }
        Ok(profile)
    }

    async fn forget_credit(&self, creator_id: &CreatorId, payment: &PaymentId) -> Result<(), StoreError> {
        let mut patch = FieldPatch::new();
        patch.insert(marker(CREDITED_PAYMENTS, payment), Value::Null);
        self.write(creator_id, patch).await
    }
}

impl std::fmt::Debug for DocumentUserAccounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentUserAccounts").finish_non_exhaustive()
    }
}
