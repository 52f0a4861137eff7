//! Billing processor events.
//!
//! Signature verification and typed decoding of inbound webhook events.
//! Nothing here touches storage; reconciliation lives in the application
//! layer.

mod billing_event;
mod stripe_event;
mod webhook_errors;
mod webhook_verifier;

pub use billing_event::{
    BillingEvent, BillingEventType, CheckoutCompleted, CheckoutMetadata, InvoicePayment,
    SubscriptionChanged,
};
pub use stripe_event::{
    Expandable, StripeCheckoutSession, StripeEvent, StripeEventData, StripeInvoice,
    StripeSubscription, StripeSubscriptionDetails,
};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{
    signature_header, SignatureHeader, WebhookSignatureVerifier, DEFAULT_TOLERANCE_SECS,
};
