//! HTTP DTOs for subscription endpoints.
//!
//! Field names are camelCase on the wire; clients already consume that shape.

use serde::{Deserialize, Serialize};

use crate::application::{
    CreateSubscriptionResult, GetSubscriptionStatusResult, GetUserPermissionsResult,
    ReconcilePremiumFlagsResult,
};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    AccessDecision, CreatorProfile, CreatorSubscription, GrantedVia, PaymentStatus,
    PlatformSubscription, SubscriptionKind, SubscriptionStatus,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/subscriptions/check-access`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAccessRequest {
    #[serde(default)]
    pub creator_id: Option<String>,
    /// Minimum creator tier. Absent means any active subscription.
    #[serde(default)]
    pub required_tier: Option<String>,
}

/// Body of `POST /api/subscriptions`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub tier_id: String,
    #[serde(rename = "type")]
    pub kind: SubscriptionKind,
    #[serde(default)]
    pub creator_id: Option<String>,
}

/// Body of `POST /api/admin/reconcile-premium`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePremiumRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckAccessResponse {
    pub has_access: bool,
    #[serde(rename = "type")]
    pub granted_via: GrantedVia,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl From<AccessDecision> for CheckAccessResponse {
    fn from(decision: AccessDecision) -> Self {
        Self {
            has_access: decision.has_access,
            granted_via: decision.granted_via,
            tier: decision.tier,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionResponse {
    pub session_id: String,
    pub checkout_url: Option<String>,
    pub success: bool,
}

impl From<CreateSubscriptionResult> for CreateSubscriptionResponse {
    fn from(result: CreateSubscriptionResult) -> Self {
        Self {
            session_id: result.session_id,
            checkout_url: result.checkout_url,
            success: true,
        }
    }
}

/// Platform subscription as returned to its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSubscriptionResponse {
    pub id: String,
    pub user_id: String,
    pub tier_id: String,
    pub status: SubscriptionStatus,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub auto_renew: bool,
    pub payment_status: PaymentStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<PlatformSubscription> for PlatformSubscriptionResponse {
    fn from(sub: PlatformSubscription) -> Self {
        let lifecycle = sub.lifecycle;
        Self {
            id: sub.id.to_string(),
            user_id: sub.user_id.to_string(),
            tier_id: sub.tier_id,
            status: lifecycle.status,
            start_date: lifecycle.start_date,
            end_date: lifecycle.end_date,
            auto_renew: lifecycle.auto_renew,
            payment_status: lifecycle.payment_status,
            created_at: lifecycle.created_at,
            updated_at: lifecycle.updated_at,
        }
    }
}

/// Creator subscription as returned to the subscriber.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSubscriptionResponse {
    pub id: String,
    pub creator_id: String,
    pub subscriber_id: String,
    pub tier_id: String,
    pub status: SubscriptionStatus,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub auto_renew: bool,
    pub payment_status: PaymentStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<CreatorSubscription> for CreatorSubscriptionResponse {
    fn from(sub: CreatorSubscription) -> Self {
        let lifecycle = sub.lifecycle;
        Self {
            id: sub.id.to_string(),
            creator_id: sub.creator_id.to_string(),
            subscriber_id: sub.subscriber_id.to_string(),
            tier_id: sub.tier_id,
            status: lifecycle.status,
            start_date: lifecycle.start_date,
            end_date: lifecycle.end_date,
            auto_renew: lifecycle.auto_renew,
            payment_status: lifecycle.payment_status,
            created_at: lifecycle.created_at,
            updated_at: lifecycle.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatusResponse {
    pub platform_subscription: Option<PlatformSubscriptionResponse>,
    pub creator_subscriptions: Vec<CreatorSubscriptionResponse>,
}

impl From<GetSubscriptionStatusResult> for SubscriptionStatusResponse {
    fn from(result: GetSubscriptionStatusResult) -> Self {
        Self {
            platform_subscription: result.platform_subscription.map(Into::into),
            creator_subscriptions: result
                .creator_subscriptions
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsResponse {
    pub is_premium: bool,
    pub is_creator: bool,
    pub creator_profile: Option<CreatorProfile>,
    pub subscription_tier: Option<String>,
    pub creator_subscriptions: Vec<CreatorSubscriptionResponse>,
}

impl From<GetUserPermissionsResult> for UserPermissionsResponse {
    fn from(result: GetUserPermissionsResult) -> Self {
        Self {
            is_premium: result.is_premium,
            is_creator: result.is_creator,
            creator_profile: result.creator_profile,
            subscription_tier: result.subscription_tier,
            creator_subscriptions: result
                .creator_subscriptions
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePremiumResponse {
    pub users_checked: usize,
    pub flags_changed: usize,
    pub failures: usize,
}

impl From<ReconcilePremiumFlagsResult> for ReconcilePremiumResponse {
    fn from(result: ReconcilePremiumFlagsResult) -> Self {
        Self {
            users_checked: result.users_checked,
            flags_changed: result.flags_changed,
            failures: result.failures,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response
// ════════════════════════════════════════════════════════════════════════════════

/// Structured error body. `code` is stable; clients branch on it rather than
/// on the HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
