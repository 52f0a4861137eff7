//! GetUserPermissionsHandler - Query handler for the entitlement summary of a user.

use std::sync::Arc;

use crate::application::RetryPolicy;
use crate::domain::foundation::UserId;
use crate::domain::subscription::{CreatorProfile, CreatorSubscription};
use crate::ports::{SubscriptionStore, UserAccounts};

#[derive(Debug, Clone)]
pub struct GetUserPermissionsQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetUserPermissionsResult {
    pub is_premium: bool,
    pub is_creator: bool,
    pub creator_profile: Option<CreatorProfile>,
    /// Tier of the active platform subscription.
    pub subscription_tier: Option<String>,
    pub creator_subscriptions: Vec<CreatorSubscription>,
}

/// Handler for the permissions summary.
///
/// `is_premium` is the stored flag OR an active platform row, so a flag
/// that lags behind reconciliation never hides a paid subscription.
pub struct GetUserPermissionsHandler {
    store: Arc<dyn SubscriptionStore>,
    accounts: Arc<dyn UserAccounts>,
    retry: RetryPolicy,
}

impl GetUserPermissionsHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, accounts: Arc<dyn UserAccounts>) -> Self {
        Self {
            store,
            accounts,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn handle(&self, query: GetUserPermissionsQuery) -> GetUserPermissionsResult {
        let user_id = &query.user_id;

        let (account, platform, creators) = tokio::join!(
            self.retry.run("account", || self.accounts.account(user_id)),
            self.retry.run("active_platform_subscription", || {
                self.store.active_platform_subscription(user_id)
            }),
            self.retry.run("active_creator_subscriptions", || {
                self.store.active_creator_subscriptions(user_id)
            }),
        );

        let account = account
            .unwrap_or_else(|err| {
                tracing::error!(user_id = %user_id, error = %err, "Failed to load user account");
                None
            })
            .unwrap_or_default();
        let platform = platform.unwrap_or_else(|err| {
            tracing::error!(user_id = %user_id, error = %err, "Failed to load platform subscription");
            None
        });
        let creator_subscriptions = creators.unwrap_or_else(|err| {
            tracing::error!(user_id = %user_id, error = %err, "Failed to load creator subscriptions");
            Vec::new()
        });

        let platform = platform.filter(|sub| sub.is_active());
        if platform.is_some() && !account.is_premium {
            tracing::warn!(user_id = %user_id, "Premium flag lags active platform subscription");
        }

        GetUserPermissionsResult {
            is_premium: account.is_premium || platform.is_some(),
            is_creator: account.is_creator,
            creator_profile: account.creator_profile,
            subscription_tier: platform.map(|sub| sub.tier_id),
            creator_subscriptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_support::{creator, fast_retry, user, Fixture};
    use crate::domain::foundation::SubscriptionId;
    use crate::domain::subscription::PlatformSubscription;

    fn handler(fixture: &Fixture) -> GetUserPermissionsHandler {
        GetUserPermissionsHandler::new(fixture.store.clone(), fixture.accounts.clone())
            .with_retry(fast_retry())
    }

    fn query(id: &str) -> GetUserPermissionsQuery {
        GetUserPermissionsQuery { user_id: user(id) }
    }

    #[tokio::test]
    async fn unknown_user_has_no_permissions() {
        let fixture = Fixture::new();
        let result = handler(&fixture).handle(query("nobody")).await;
        assert_eq!(result, GetUserPermissionsResult::default());
    }

    #[tokio::test]
    async fn active_platform_row_overrides_stale_flag() {
        let fixture = Fixture::new();
        let sub = PlatformSubscription::from_checkout(user("u1"), "premium-yearly", "sub_p", 12);
        fixture.store.upsert_platform(&sub).await.unwrap();

        let result = handler(&fixture).handle(query("u1")).await;

        assert!(result.is_premium);
        assert_eq!(result.subscription_tier.as_deref(), Some("premium-yearly"));
    }

    #[tokio::test]
    async fn creator_fields_come_from_the_user_record() {
        let fixture = Fixture::new();
        for _ in 0..2 {
            fixture
                .accounts
                .count_subscriber(&creator("c1"), &SubscriptionId::new())
                .await
                .unwrap();
        }
        fixture.accounts.set_premium(&user("c1"), true).await.unwrap();

        let result = handler(&fixture).handle(query("c1")).await;

        assert!(result.is_premium);
        assert_eq!(result.subscription_tier, None);
        assert_eq!(result.creator_profile.map(|p| p.subscriber_count), Some(2));
    }

    #[tokio::test]
    async fn lists_active_creator_subscriptions() {
        let fixture = Fixture::new();
        let sub = CreatorSubscription::from_checkout(user("fan"), creator("c1"), "creator-pro", "sub_c", 1);
        fixture.store.upsert_creator(&sub).await.unwrap();

        let result = handler(&fixture).handle(query("fan")).await;

        assert!(!result.is_premium);
        let ids: Vec<_> = result.creator_subscriptions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![sub.id]);
    }

    #[tokio::test]
    async fn read_failures_degrade_to_defaults() {
        let fixture = Fixture::new();
        fixture.accounts.set_premium(&user("u1"), true).await.unwrap();
        fixture.docs.set_fail_reads(true);

        let result = handler(&fixture).handle(query("u1")).await;
        assert_eq!(result, GetUserPermissionsResult::default());
    }
}
