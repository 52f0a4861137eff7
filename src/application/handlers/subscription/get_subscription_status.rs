//! GetSubscriptionStatusHandler - Query handler for a user's current subscriptions.

use std::sync::Arc;

use crate::application::RetryPolicy;
use crate::domain::foundation::UserId;
use crate::domain::subscription::{CreatorSubscription, PlatformSubscription};
use crate::ports::SubscriptionStore;

/// Query for the caller's active subscriptions.
#[derive(Debug, Clone)]
pub struct GetSubscriptionStatusQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetSubscriptionStatusResult {
    pub platform_subscription: Option<PlatformSubscription>,
    pub creator_subscriptions: Vec<CreatorSubscription>,
}

/// Handler for subscription status.
///
/// Read failures degrade to "none" for the affected half with a logged
/// error; the query itself never fails.
pub struct GetSubscriptionStatusHandler {
    store: Arc<dyn SubscriptionStore>,
    retry: RetryPolicy,
}

impl GetSubscriptionStatusHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn handle(&self, query: GetSubscriptionStatusQuery) -> GetSubscriptionStatusResult {
        let user_id = &query.user_id;

        let (platform, creators) = tokio::join!(
            self.retry.run("active_platform_subscription", || {
                self.store.active_platform_subscription(user_id)
            }),
            self.retry.run("active_creator_subscriptions", || {
                self.store.active_creator_subscriptions(user_id)
            }),
        );

        let platform_subscription = platform.unwrap_or_else(|err| {
            tracing::error!(user_id = %user_id, error = %err, "Failed to load platform subscription");
            None
        });
        let creator_subscriptions = creators.unwrap_or_else(|err| {
            tracing::error!(user_id = %user_id, error = %err, "Failed to load creator subscriptions");
            Vec::new()
        });

        GetSubscriptionStatusResult {
            platform_subscription,
            creator_subscriptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_support::{creator, fast_retry, user, Fixture};

    #[tokio::test]
    async fn returns_both_subscription_domains() {
        let fixture = Fixture::new();
        let platform = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", "sub_p", 1);
        fixture.store.upsert_platform(&platform).await.unwrap();
        for (creator_id, ext) in [("c1", "sub_1"), ("c2", "sub_2")] {
            let sub = CreatorSubscription::from_checkout(user("u1"), creator(creator_id), "creator-basic", ext, 1);
            fixture.store.upsert_creator(&sub).await.unwrap();
        }

        let result = GetSubscriptionStatusHandler::new(fixture.store.clone())
            .with_retry(fast_retry())
            .handle(GetSubscriptionStatusQuery { user_id: user("u1") })
            .await;

        assert_eq!(result.platform_subscription.map(|s| s.id), Some(platform.id));
        assert_eq!(result.creator_subscriptions.len(), 2);
    }

    #[tokio::test]
    async fn user_without_subscriptions_gets_empty_status() {
        let fixture = Fixture::new();
        let result = GetSubscriptionStatusHandler::new(fixture.store.clone())
            .handle(GetSubscriptionStatusQuery { user_id: user("u1") })
            .await;
        assert_eq!(result, GetSubscriptionStatusResult::default());
    }

    #[tokio::test]
    async fn read_failures_degrade_to_empty() {
        let fixture = Fixture::new();
        let platform = PlatformSubscription::from_checkout(user("u1"), "premium-monthly", "sub_p", 1);
        fixture.store.upsert_platform(&platform).await.unwrap();
        fixture.docs.set_fail_reads(true);

        let result = GetSubscriptionStatusHandler::new(fixture.store.clone())
            .with_retry(fast_retry())
            .handle(GetSubscriptionStatusQuery { user_id: user("u1") })
            .await;
        assert_eq!(result, GetSubscriptionStatusResult::default());
    }
}
