//! Subscription-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | Code | HTTP Status |
//! |-------|------|-------------|
//! | InvalidRequest | INVALID_REQUEST | 400 |
//! | InvalidTier | INVALID_TIER | 400 |
//! | MissingCreatorId | MISSING_CREATOR_ID | 400 |
//! | BillingConfig | STRIPE_CONFIG_ERROR | 500 |
//! | CheckoutSession | STRIPE_SESSION_ERROR | 502 |
//! | NotFound | NOT_FOUND | 404 |
//! | Infrastructure | INTERNAL_ERROR | 500 |

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, ValidationError};

/// Errors surfaced by the checkout, status and permission operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    #[error("Creator ID is required for creator subscriptions")]
    MissingCreatorId,

    #[error("Billing configuration error: {0}")]
    BillingConfig(String),

    #[error("Checkout session could not be created: {0}")]
    CheckoutSession(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl SubscriptionError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        SubscriptionError::InvalidRequest(message.into())
    }

    pub fn invalid_tier(tier_id: impl Into<String>) -> Self {
        SubscriptionError::InvalidTier(tier_id.into())
    }

    pub fn billing_config(message: impl Into<String>) -> Self {
        SubscriptionError::BillingConfig(message.into())
    }

    pub fn checkout_session(message: impl Into<String>) -> Self {
        SubscriptionError::CheckoutSession(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    /// Stable code clients branch on.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            SubscriptionError::InvalidTier(_) => ErrorCode::InvalidTier,
            SubscriptionError::MissingCreatorId => ErrorCode::MissingCreatorId,
            SubscriptionError::BillingConfig(_) => ErrorCode::StripeConfigError,
            SubscriptionError::CheckoutSession(_) => ErrorCode::StripeSessionError,
            SubscriptionError::NotFound(_) => ErrorCode::NotFound,
            SubscriptionError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    /// Client-facing message. Infrastructure detail is not exposed.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::Infrastructure(_) => "An internal error occurred".to_string(),
            SubscriptionError::CheckoutSession(_) => {
                "Failed to create checkout session".to_string()
            }
            SubscriptionError::BillingConfig(_) => "Billing is not configured".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        SubscriptionError::InvalidRequest(err.to_string())
    }
}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::InvalidRequest => SubscriptionError::InvalidRequest(err.message),
            ErrorCode::NotFound => SubscriptionError::NotFound(err.message),
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}
