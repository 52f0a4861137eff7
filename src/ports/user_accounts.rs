//! User Accounts Port - Entitlement fields owned by the user aggregate.
//!
//! Only the fields this service maintains are exposed: the premium flag and
//! the creator revenue counters.

use async_trait::async_trait;

use crate::domain::foundation::{CreatorId, PaymentId, SubscriptionId, UserId};
use crate::domain::subscription::CreatorProfile;

use super::document_store::StoreError;

/// Entitlement view of a user record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserAccount {
    pub is_premium: bool,
    pub is_creator: bool,
    pub creator_profile: Option<CreatorProfile>,
}

/// Port for reading and patching user entitlement fields.
#[async_trait]
pub trait UserAccounts: Send + Sync {
    /// `Ok(None)` when no user record exists.
    async fn account(&self, user_id: &UserId) -> Result<Option<UserAccount>, StoreError>;

    async fn set_premium(&self, user_id: &UserId, is_premium: bool) -> Result<(), StoreError>;

    /// Adds one to the subscriber count for `subscription`, once.
    ///
    /// The subscription is remembered on the creator's record in the same
    /// write, so repeating the call changes nothing. Creates the profile
    /// when missing. Returns the profile as it stands afterwards.
    async fn count_subscriber(
        &self,
        creator_id: &CreatorId,
        subscription: &SubscriptionId,
    ) -> Result<CreatorProfile, StoreError>;

    /// Removes one from the subscriber count if `subscription` was counted,
    /// flooring at zero. Repeating the call changes nothing.
    async fn release_subscriber(
        &self,
        creator_id: &CreatorId,
        subscription: &SubscriptionId,
    ) -> Result<CreatorProfile, StoreError>;

    /// Adds `amount` to total earnings once per `payment`. Non-positive
    /// amounts are ignored.
    async fn credit_earnings(
        &self,
        creator_id: &CreatorId,
        payment: &PaymentId,
        amount: f64,
    ) -> Result<CreatorProfile, StoreError>;

    /// Drops the marker `credit_earnings` left for `payment`. Called once
    /// the payment ledger row is marked applied.
    async fn forget_credit(&self, creator_id: &CreatorId, payment: &PaymentId) -> Result<(), StoreError>;
}
