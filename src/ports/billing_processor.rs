//! Billing Processor Port - Interface for the external payment processor.
//!
//! The processor owns money movement and hosted checkout. This service only
//! asks it for checkout sessions; everything else arrives as webhook events.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for creating hosted checkout sessions.
#[async_trait]
pub trait BillingProcessor: Send + Sync {
    /// Creates a subscription-mode checkout session for one unit of
    /// `price_ref`.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BillingError>;
}

/// Request to create a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    /// Processor price id for the tier being purchased.
    pub price_ref: String,

    pub success_url: String,

    pub cancel_url: String,

    /// Internal user id, echoed back on the completed session.
    pub client_reference_id: String,

    /// Opaque metadata echoed back on every event about the resulting
    /// subscription.
    pub metadata: BTreeMap<String, String>,
}

/// Hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Processor session id (cs_...).
    pub id: String,

    /// Hosted checkout page, when the processor returns one.
    pub url: Option<String>,
}

/// Error categories for processor calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingErrorCode {
    /// Missing or rejected credentials.
    Configuration,
    /// Processor unreachable.
    Network,
    /// Processor rejected the request.
    Provider,
    /// Processor response could not be understood.
    InvalidResponse,
}

impl BillingErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingErrorCode::Network)
    }
}

impl fmt::Display for BillingErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BillingErrorCode::Configuration => "configuration_error",
            BillingErrorCode::Network => "network_error",
            BillingErrorCode::Provider => "provider_error",
            BillingErrorCode::InvalidResponse => "invalid_response",
        };
        write!(f, "{}", s)
    }
}

/// Errors from billing processor operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingError {
    pub code: BillingErrorCode,

    pub message: String,

    /// Processor's own error code, if it sent one.
    pub provider_code: Option<String>,

    pub retryable: bool,
}

impl BillingError {
    pub fn new(code: BillingErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::Configuration, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::Network, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::Provider, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCode::InvalidResponse, message)
    }
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for BillingError {}
