//! CheckAccessHandler - Query handler for gated content access.
//!
//! Platform subscribers bypass creator tier checks. Every read failure
//! degrades toward denial; the caller only ever sees an [`AccessDecision`].

use std::sync::Arc;

use crate::application::RetryPolicy;
use crate::domain::foundation::{CreatorId, UserId};
use crate::domain::subscription::{AccessDecision, TierRegistry};
use crate::ports::SubscriptionStore;

/// Query to check access to gated content.
#[derive(Debug, Clone)]
pub struct CheckAccessQuery {
    pub user_id: UserId,
    /// Creator whose content is being opened, if any.
    pub creator_id: Option<CreatorId>,
    /// Minimum creator tier the content requires. Creator access needs a
    /// recognized tier here; `None` only leaves the platform route.
    pub required_tier: Option<String>,
}

/// Handler for access checks.
///
/// Runs on every gated read, so store calls go through the retry policy.
pub struct CheckAccessHandler {
    store: Arc<dyn SubscriptionStore>,
    tiers: Arc<TierRegistry>,
    retry: RetryPolicy,
}

impl CheckAccessHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, tiers: Arc<TierRegistry>) -> Self {
        Self {
            store,
            tiers,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn handle(&self, query: CheckAccessQuery) -> AccessDecision {
        let user_id = &query.user_id;

        match self
            .retry
            .run("active_platform_subscription", || {
                self.store.active_platform_subscription(user_id)
            })
            .await
        {
            Ok(Some(sub)) if sub.is_active() => {
                tracing::debug!(user_id = %user_id, "Access granted via platform subscription");
                return AccessDecision::via_platform();
            }
            Ok(_) => {}
            Err(err) => {
                // Fall through to the creator check rather than denying outright.
                tracing::warn!(user_id = %user_id, error = %err, "Platform subscription lookup failed");
            }
        }

        let Some(creator_id) = query.creator_id.as_ref() else {
            return AccessDecision::denied();
        };

        let held = match self
            .retry
            .run("active_creator_subscription", || {
                self.store.active_creator_subscription(user_id, creator_id)
            })
            .await
        {
            Ok(Some(sub)) if sub.is_active() => sub,
            Ok(_) => return AccessDecision::denied(),
            Err(err) => {
                tracing::error!(
                    user_id = %user_id,
                    creator_id = %creator_id,
                    error = %err,
                    "Creator subscription lookup failed, denying access"
                );
                return AccessDecision::denied();
            }
        };

        // An absent tier is an unrecognized tier and fails closed.
        let required = query.required_tier.as_deref().map(str::trim).unwrap_or_default();
        let sufficient = self.tiers.is_sufficient(&held.tier_id, required);

        if sufficient {
            tracing::debug!(
                user_id = %user_id,
                creator_id = %creator_id,
                tier = %held.tier_id,
                "Access granted via creator subscription"
            );
            AccessDecision::via_creator(held.tier_id)
        } else {
            tracing::info!(
                user_id = %user_id,
                creator_id = %creator_id,
                held = %held.tier_id,
                required = ?query.required_tier,
                "Creator subscription tier insufficient"
            );
            AccessDecision::denied()
        }
    }
}
