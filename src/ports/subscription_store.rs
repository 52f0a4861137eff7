//! Subscription Store Port - Read/write access to subscription collections.

use async_trait::async_trait;

use crate::domain::foundation::{CreatorId, PaymentId, SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{
    CreatorSubscription, PaymentStatus, PlatformSubscription, SubscriptionKind,
    SubscriptionLifecycle, SubscriptionPayment, SubscriptionStatus,
};

use super::document_store::StoreError;

/// Fields the reconciler changes on an existing row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionPatch {
    pub status: Option<SubscriptionStatus>,
    pub end_date: Option<Timestamp>,
    pub auto_renew: Option<bool>,
    pub payment_status: Option<PaymentStatus>,
    pub updated_at: Option<Timestamp>,
}

impl SubscriptionPatch {
    /// Captures the mutable lifecycle fields of a row after an in-memory change.
    pub fn from_lifecycle(lifecycle: &SubscriptionLifecycle) -> Self {
        Self {
            status: Some(lifecycle.status),
            end_date: Some(lifecycle.end_date),
            auto_renew: Some(lifecycle.auto_renew),
            payment_status: Some(lifecycle.payment_status),
            updated_at: Some(lifecycle.updated_at),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Result of appending to the payment ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentRecordOutcome {
    Recorded,
    /// A row for the same external payment exists but its effects were not
    /// all applied. Carries the stored row; nothing written.
    Pending(SubscriptionPayment),
    /// A fully applied row for the same external payment exists; nothing
    /// written.
    Duplicate,
}

/// Port for the platform, creator and payment collections.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// The user's active platform subscription, if any.
    ///
    /// When several rows are active (an invariant violation) the most
    /// recently created one is returned.
    async fn active_platform_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<PlatformSubscription>, StoreError>;

    /// Every active platform row for the user.
    async fn active_platform_subscriptions(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PlatformSubscription>, StoreError>;

    async fn active_creator_subscription(
        &self,
        subscriber_id: &UserId,
        creator_id: &CreatorId,
    ) -> Result<Option<CreatorSubscription>, StoreError>;

    /// Every active creator subscription held by the subscriber.
    async fn active_creator_subscriptions(
        &self,
        subscriber_id: &UserId,
    ) -> Result<Vec<CreatorSubscription>, StoreError>;

    async fn platform_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<PlatformSubscription>, StoreError>;

    async fn creator_subscription_by_external_id(
        &self,
        external_subscription_id: &str,
    ) -> Result<Option<CreatorSubscription>, StoreError>;

    async fn upsert_platform(&self, subscription: &PlatformSubscription) -> Result<(), StoreError>;

    async fn upsert_creator(&self, subscription: &CreatorSubscription) -> Result<(), StoreError>;

    /// Writes only the fields set in `patch`.
    async fn update_fields(
        &self,
        kind: SubscriptionKind,
        id: &SubscriptionId,
        patch: SubscriptionPatch,
    ) -> Result<(), StoreError>;

    /// Distinct users owning at least one platform row, in any status.
    async fn platform_subscriber_ids(&self) -> Result<Vec<UserId>, StoreError>;

    /// Appends a ledger row unless one already exists for the same
    /// external payment id.
    async fn record_payment(
        &self,
        payment: &SubscriptionPayment,
    ) -> Result<PaymentRecordOutcome, StoreError>;

    /// Flags a ledger row as fully applied.
    async fn mark_payment_applied(&self, id: &PaymentId) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patch_is_empty() {
        assert!(SubscriptionPatch::default().is_empty());
        assert!(!SubscriptionPatch {
            status: Some(SubscriptionStatus::Cancelled),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn patch_from_lifecycle_copies_mutable_fields() {
        let lifecycle = SubscriptionLifecycle::started("sub_1", 1, Timestamp::now());
        let patch = SubscriptionPatch::from_lifecycle(&lifecycle);
        assert_eq!(patch.status, Some(SubscriptionStatus::Active));
        assert_eq!(patch.end_date, Some(lifecycle.end_date));
        assert_eq!(patch.payment_status, Some(PaymentStatus::Paid));
    }

    #[test]
    fn subscription_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SubscriptionStore) {}
    }
}
