//! Webhook error types.
//!
//! Status codes drive the processor's redelivery: 4xx is terminal, 5xx is
//! redelivered later. Events that are deliberately not applied are not
//! errors and are acknowledged with 200.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signed timestamp is older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required metadata field missing from the event.
    #[error("Missing metadata: {0}")]
    MissingMetadata(&'static str),

    /// Document store read or write failed.
    #[error("Store error: {0}")]
    Store(String),
}

impl WebhookError {
    /// Returns true if the processor should redeliver this event.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Store(_))
    }

    /// Maps the error to the HTTP status returned to the processor.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingMetadata(_) => StatusCode::BAD_REQUEST,

            WebhookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
