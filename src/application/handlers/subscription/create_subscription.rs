//! CreateSubscriptionHandler - Command handler for starting a hosted checkout.
//!
//! Nothing is persisted here. The subscription row is created when the
//! processor reports the completed checkout, using the metadata attached to
//! the session.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::foundation::{CreatorId, UserId};
use crate::domain::subscription::{SubscriptionError, SubscriptionKind, TierRegistry, TierScope};
use crate::ports::{BillingErrorCode, BillingProcessor, CheckoutSessionRequest};

/// Where the hosted checkout sends the user afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Command to start a subscription checkout.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_id: UserId,
    pub kind: SubscriptionKind,
    pub tier_id: String,
    /// Required for creator subscriptions, ignored otherwise.
    pub creator_id: Option<String>,
}

/// Result of successful checkout initiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionResult {
    pub session_id: String,
    pub checkout_url: Option<String>,
}

/// Handler for starting subscription checkouts.
pub struct CreateSubscriptionHandler {
    billing: Arc<dyn BillingProcessor>,
    tiers: Arc<TierRegistry>,
    urls: CheckoutUrls,
}

impl CreateSubscriptionHandler {
    pub fn new(
        billing: Arc<dyn BillingProcessor>,
        tiers: Arc<TierRegistry>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            billing,
            tiers,
            urls,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CreateSubscriptionResult, SubscriptionError> {
        // 1. Resolve the tier to something purchasable in the requested scope
        let requested = cmd.tier_id.trim();
        let scope = match cmd.kind {
            SubscriptionKind::Platform => TierScope::Platform,
            SubscriptionKind::Creator => TierScope::Creator,
        };
        let tier = self
            .tiers
            .lookup(requested)
            .filter(|def| def.scope == scope)
            .ok_or_else(|| SubscriptionError::invalid_tier(requested))?;
        let price_ref = tier
            .price_ref
            .clone()
            .ok_or_else(|| SubscriptionError::invalid_tier(requested))?;

        // 2. Creator checkouts must name the creator
        let creator_id = match cmd.kind {
            SubscriptionKind::Creator => {
                let raw = cmd.creator_id.as_deref().unwrap_or_default();
                Some(CreatorId::new(raw.trim()).map_err(|_| SubscriptionError::MissingCreatorId)?)
            }
            SubscriptionKind::Platform => None,
        };

        // 3. Metadata is the only link from processor events back to tiers and creators
        let mut metadata = BTreeMap::new();
        metadata.insert("userId".to_string(), cmd.user_id.to_string());
        metadata.insert("type".to_string(), cmd.kind.to_string());
        metadata.insert("tierId".to_string(), tier.id.clone());
        if let Some(creator_id) = &creator_id {
            metadata.insert("creatorId".to_string(), creator_id.to_string());
        }

        let request = CheckoutSessionRequest {
            price_ref,
            success_url: self.urls.success_url.clone(),
            cancel_url: self.urls.cancel_url.clone(),
            client_reference_id: cmd.user_id.to_string(),
            metadata,
        };

        // 4. Create the hosted session
        let session = self
            .billing
            .create_checkout_session(request)
            .await
            .map_err(|err| {
                tracing::error!(
                    user_id = %cmd.user_id,
                    tier = %tier.id,
                    error = %err,
                    provider_code = ?err.provider_code,
                    "Checkout session creation failed"
                );
                match err.code {
                    BillingErrorCode::Configuration => SubscriptionError::billing_config(err.message),
                    _ => SubscriptionError::checkout_session(err.message),
                }
            })?;

        tracing::info!(
            user_id = %cmd.user_id,
            kind = %cmd.kind,
            tier = %tier.id,
            creator_id = ?creator_id.as_ref().map(CreatorId::as_str),
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(CreateSubscriptionResult {
            session_id: session.id,
            checkout_url: session.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::test_support::{priced_tiers, user};
    use crate::adapters::stripe::MockBillingProcessor;
    use crate::domain::foundation::ErrorCode;
    use crate::ports::BillingError;

    fn handler(billing: &MockBillingProcessor) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            Arc::new(billing.clone()),
            Arc::new(priced_tiers()),
            CheckoutUrls {
                success_url: "https://app.test/success".to_string(),
                cancel_url: "https://app.test/cancel".to_string(),
            },
        )
    }

    fn command(kind: SubscriptionKind, tier: &str, creator_id: Option<&str>) -> CreateSubscriptionCommand {
        CreateSubscriptionCommand {
            user_id: user("u1"),
            kind,
            tier_id: tier.to_string(),
            creator_id: creator_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn platform_checkout_carries_reconciliation_metadata() {
        let billing = MockBillingProcessor::new().with_checkout_base_url("https://pay.test");
        let result = handler(&billing)
            .handle(command(SubscriptionKind::Platform, "premium-monthly", Some("ignored")))
            .await
            .unwrap();

        assert!(result.session_id.starts_with("cs_mock_"));
        assert!(result.checkout_url.is_some());

        let request = billing.last_request().unwrap();
        assert_eq!(request.price_ref, "price_premium_monthly");
        assert_eq!(request.client_reference_id, "u1");
        assert_eq!(request.metadata.get("userId").map(String::as_str), Some("u1"));
        assert_eq!(request.metadata.get("type").map(String::as_str), Some("platform"));
        assert_eq!(request.metadata.get("tierId").map(String::as_str), Some("premium-monthly"));
        assert!(!request.metadata.contains_key("creatorId"));
    }

    #[tokio::test]
    async fn creator_checkout_uses_canonical_tier_id() {
        let billing = MockBillingProcessor::new();
        handler(&billing)
            .handle(command(SubscriptionKind::Creator, "pro", Some("c1")))
            .await
            .unwrap();

        let request = billing.last_request().unwrap();
        assert_eq!(request.price_ref, "price_creator_pro");
        assert_eq!(request.metadata.get("tierId").map(String::as_str), Some("creator-pro"));
        assert_eq!(request.metadata.get("creatorId").map(String::as_str), Some("c1"));
        assert_eq!(request.metadata.get("type").map(String::as_str), Some("creator"));
    }

    #[tokio::test]
    async fn unknown_tier_is_rejected_before_calling_processor() {
        let billing = MockBillingProcessor::new();
        let err = handler(&billing)
            .handle(command(SubscriptionKind::Platform, "premium-lifetime", None))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidTier);
        assert!(billing.requests().is_empty());
    }

    #[tokio::test]
    async fn tier_from_other_scope_is_rejected() {
        let billing = MockBillingProcessor::new();
        let err = handler(&billing)
            .handle(command(SubscriptionKind::Platform, "creator-basic", None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTier);
    }

    #[tokio::test]
    async fn tier_without_price_is_rejected() {
        let billing = MockBillingProcessor::new();
        let err = handler(&billing)
            .handle(command(SubscriptionKind::Creator, "creator-vip", Some("c1")))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTier);
    }

    #[tokio::test]
    async fn creator_checkout_requires_creator_id() {
        let billing = MockBillingProcessor::new();
        for creator_id in [None, Some(""), Some("   ")] {
            let err = handler(&billing)
                .handle(command(SubscriptionKind::Creator, "creator-basic", creator_id))
                .await
                .unwrap_err();
            assert_eq!(err, SubscriptionError::MissingCreatorId);
        }
        assert!(billing.requests().is_empty());
    }

    #[tokio::test]
    async fn processor_failures_map_to_stable_codes() {
        let billing = MockBillingProcessor::new();
        let handler = handler(&billing);

        billing.fail_next(BillingError::provider("No such price"));
        let err = handler
            .handle(command(SubscriptionKind::Platform, "premium-monthly", None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StripeSessionError);

        billing.fail_next(BillingError::configuration("Invalid API Key"));
        let err = handler
            .handle(command(SubscriptionKind::Platform, "premium-monthly", None))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::StripeConfigError);
    }
}
