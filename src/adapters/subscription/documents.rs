//! Stored document shapes for the subscription collections.
//!
//! Platform rows carry the owner under both `userID` and `userId`; older
//! writers used one or the other and lookups accept either.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CreatorId, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{
    CreatorSubscription, PaymentStatus, PlatformSubscription, SubscriptionKind,
    SubscriptionLifecycle, SubscriptionPayment, SubscriptionStatus,
};
use crate::ports::StoreError;

pub const PLATFORM_COLLECTION: &str = "premium_subscriptions";
pub const CREATOR_COLLECTION: &str = "creator_subscriptions";
pub const PAYMENT_COLLECTION: &str = "subscription_payments";

pub const FIELD_USER_ID_UPPER: &str = "userID";
pub const FIELD_USER_ID: &str = "userId";
pub const FIELD_SUBSCRIBER_ID: &str = "subscriberId";
pub const FIELD_EXTERNAL_ID: &str = "stripeSubId";

/// Fields the subscription adapter queries by equality. Backends that need
/// explicit index registration should register these.
pub const INDEXED_FIELDS: &[(&str, &str)] = &[
    (PLATFORM_COLLECTION, FIELD_USER_ID_UPPER),
    (PLATFORM_COLLECTION, FIELD_USER_ID),
    (PLATFORM_COLLECTION, FIELD_EXTERNAL_ID),
    (CREATOR_COLLECTION, FIELD_SUBSCRIBER_ID),
    (CREATOR_COLLECTION, FIELD_EXTERNAL_ID),
];

pub fn collection_for(kind: SubscriptionKind) -> &'static str {
    match kind {
        SubscriptionKind::Platform => PLATFORM_COLLECTION,
        SubscriptionKind::Creator => CREATOR_COLLECTION,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDocument {
    pub id: String,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    pub user_id_upper: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub status: SubscriptionStatus,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SubscriptionKind>,
    pub tier_id: String,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub stripe_sub_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PlatformDocument {
    pub fn from_domain(sub: &PlatformSubscription) -> Self {
        let lifecycle = &sub.lifecycle;
        Self {
            id: sub.id.to_string(),
            user_id_upper: Some(sub.user_id.to_string()),
            user_id: Some(sub.user_id.to_string()),
            status: lifecycle.status,
            kind: Some(SubscriptionKind::Platform),
            tier_id: sub.tier_id.clone(),
            start_date: lifecycle.start_date,
            end_date: lifecycle.end_date,
            auto_renew: lifecycle.auto_renew,
            payment_status: Some(lifecycle.payment_status),
            stripe_sub_id: lifecycle.external_subscription_id.clone(),
            created_at: lifecycle.created_at,
            updated_at: lifecycle.updated_at,
        }
    }

    /// Owner id, whichever casing the writer used.
    pub fn owner(&self) -> Option<&str> {
        self.user_id_upper
            .as_deref()
            .or(self.user_id.as_deref())
            .filter(|id| !id.trim().is_empty())
    }

    pub fn owned_by(&self, user_id: &UserId) -> bool {
        self.user_id_upper.as_deref() == Some(user_id.as_str())
            || self.user_id.as_deref() == Some(user_id.as_str())
    }

    /// Rows without a `type` predate the field and are platform rows.
    pub fn is_platform(&self) -> bool {
        self.kind.map_or(true, |kind| kind == SubscriptionKind::Platform)
    }

    pub fn into_domain(self, doc_id: &str) -> Result<PlatformSubscription, StoreError> {
        let owner = self
            .owner()
            .ok_or_else(|| StoreError::Serialization(format!("platform row {} has no owner", doc_id)))?;
        let user_id = UserId::new(owner).map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(PlatformSubscription {
            id: parse_id(&self.id, doc_id)?,
            user_id,
            tier_id: self.tier_id,
            lifecycle: SubscriptionLifecycle {
                status: self.status,
                start_date: self.start_date,
                end_date: self.end_date,
                auto_renew: self.auto_renew,
                payment_status: self.payment_status.unwrap_or(PaymentStatus::Paid),
                external_subscription_id: self.stripe_sub_id,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorDocument {
    pub id: String,
    pub creator_id: String,
    pub subscriber_id: String,
    pub tier_id: String,
    pub status: SubscriptionStatus,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub stripe_sub_id: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CreatorDocument {
    pub fn from_domain(sub: &CreatorSubscription) -> Self {
        let lifecycle = &sub.lifecycle;
        Self {
            id: sub.id.to_string(),
            creator_id: sub.creator_id.to_string(),
            subscriber_id: sub.subscriber_id.to_string(),
            tier_id: sub.tier_id.clone(),
            status: lifecycle.status,
            start_date: lifecycle.start_date,
            end_date: lifecycle.end_date,
            auto_renew: lifecycle.auto_renew,
            payment_status: Some(lifecycle.payment_status),
            stripe_sub_id: lifecycle.external_subscription_id.clone(),
            created_at: lifecycle.created_at,
            updated_at: lifecycle.updated_at,
        }
    }

    pub fn into_domain(self, doc_id: &str) -> Result<CreatorSubscription, StoreError> {
        let creator_id =
            CreatorId::new(self.creator_id).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let subscriber_id =
            UserId::new(self.subscriber_id).map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(CreatorSubscription {
            id: parse_id(&self.id, doc_id)?,
            creator_id,
            subscriber_id,
            tier_id: self.tier_id,
            lifecycle: SubscriptionLifecycle {
                status: self.status,
                start_date: self.start_date,
                end_date: self.end_date,
                auto_renew: self.auto_renew,
                payment_status: self.payment_status.unwrap_or(PaymentStatus::Paid),
                external_subscription_id: self.stripe_sub_id,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        })
    }
}

/// Ledger row. `amount` is in major units for readers of the raw
/// collection; `amountCents` is authoritative. Rows written before `applied`
/// existed count as applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDocument {
    pub id: String,
    pub subscription_id: String,
    pub amount: f64,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub stripe_payment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<Timestamp>,
    #[serde(default = "applied_by_default")]
    pub applied: bool,
    pub created_at: Timestamp,
}

fn applied_by_default() -> bool {
    true
}

impl PaymentDocument {
    pub fn from_domain(payment: &SubscriptionPayment) -> Self {
        Self {
            id: payment.id.to_string(),
            subscription_id: payment.subscription_id.to_string(),
            amount: payment.amount(),
            amount_cents: payment.amount_cents,
            currency: payment.currency.clone(),
            status: payment.status,
            stripe_payment_id: payment.external_payment_id.clone(),
            period_end: payment.period_end,
            applied: payment.applied,
            created_at: payment.created_at,
        }
    }

    pub fn into_domain(self, doc_id: &str) -> Result<SubscriptionPayment, StoreError> {
        let id = self
            .id
            .parse()
            .or_else(|_| doc_id.parse())
            .map_err(|_| StoreError::Serialization(format!("invalid payment id {}", doc_id)))?;
        let subscription_id = self
            .subscription_id
            .parse()
            .map_err(|_| StoreError::Serialization(format!("payment {} has no valid subscription", doc_id)))?;

        Ok(SubscriptionPayment {
            id,
            subscription_id,
            amount_cents: self.amount_cents,
            currency: self.currency,
            status: self.status,
            external_payment_id: self.stripe_payment_id,
            period_end: self.period_end,
            applied: self.applied,
            created_at: self.created_at,
        })
    }
}

/// Prefers the stored `id` field and falls back to the document key.
fn parse_id(stored: &str, doc_id: &str) -> Result<SubscriptionId, StoreError> {
    stored
        .parse()
        .or_else(|_| doc_id.parse())
        .map_err(|_| StoreError::Serialization(format!("invalid subscription id {}", doc_id)))
}
