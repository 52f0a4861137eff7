//! Platform and creator subscription aggregates.
//!
//! Rows are never deleted. Cancellation and expiry are status changes so the
//! history of every purchase cycle stays queryable.

use crate::domain::foundation::{CreatorId, SubscriptionId, Timestamp, UserId};

use super::lifecycle::SubscriptionLifecycle;
use super::status::SubscriptionKind;

/// Site-wide subscription. Grants access to all gated content while active.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub tier_id: String,
    pub lifecycle: SubscriptionLifecycle,
}

impl PlatformSubscription {
    /// Creates the row for a completed checkout.
    pub fn from_checkout(
        user_id: UserId,
        tier_id: impl Into<String>,
        external_subscription_id: impl Into<String>,
        period_months: u32,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            user_id,
            tier_id: tier_id.into(),
            lifecycle: SubscriptionLifecycle::started(
                external_subscription_id,
                period_months,
                Timestamp::now(),
            ),
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn kind(&self) -> SubscriptionKind {
        SubscriptionKind::Platform
    }
}

/// Subscription from one subscriber to one creator.
///
/// At most one active row per `(subscriber_id, creator_id)` pair; the
/// reconciler enforces this, not the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatorSubscription {
    pub id: SubscriptionId,
    pub creator_id: CreatorId,
    pub subscriber_id: UserId,
    pub tier_id: String,
    pub lifecycle: SubscriptionLifecycle,
}

impl CreatorSubscription {
    pub fn from_checkout(
        subscriber_id: UserId,
        creator_id: CreatorId,
        tier_id: impl Into<String>,
        external_subscription_id: impl Into<String>,
        period_months: u32,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            creator_id,
            subscriber_id,
            tier_id: tier_id.into(),
            lifecycle: SubscriptionLifecycle::started(
                external_subscription_id,
                period_months,
                Timestamp::now(),
            ),
        }
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn kind(&self) -> SubscriptionKind {
        SubscriptionKind::Creator
    }
}
