//! Typed billing events.
//!
//! Each known Stripe event type is decoded into its own variant; anything
//! else becomes [`BillingEvent::Unknown`] and is acknowledged without effect.

use std::collections::HashMap;

use crate::domain::subscription::SubscriptionKind;

use super::stripe_event::{StripeCheckoutSession, StripeEvent, StripeInvoice, StripeSubscription};
use super::webhook_errors::WebhookError;

/// Known Stripe event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventType {
    CheckoutSessionCompleted,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    Unknown,
}

impl BillingEventType {
    pub fn parse(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::Unknown => "unknown",
        }
    }
}

/// Reconciliation metadata embedded on the checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub user_id: Option<String>,
    pub kind: SubscriptionKind,
    pub tier_id: Option<String>,
    pub creator_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    pub session_id: String,
    pub external_subscription_id: Option<String>,
    pub metadata: CheckoutMetadata,
}

/// Subscription status change. `kind` is `None` when the subscription carries
/// no `type` metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionChanged {
    pub external_subscription_id: String,
    pub processor_status: String,
    pub kind: Option<SubscriptionKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoicePayment {
    pub invoice_id: String,
    pub external_subscription_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub kind: Option<SubscriptionKind>,
    /// First invoice of the subscription, paid as part of checkout.
    pub is_initial: bool,
}

/// A decoded billing processor event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    CheckoutCompleted(CheckoutCompleted),
    SubscriptionUpdated(SubscriptionChanged),
    SubscriptionCancelled(SubscriptionChanged),
    PaymentSucceeded(InvoicePayment),
    PaymentFailed(InvoicePayment),
    Unknown { event_type: String },
}

impl BillingEvent {
    /// Decodes the event's data object according to its type.
    pub fn decode(event: &StripeEvent) -> Result<Self, WebhookError> {
        match BillingEventType::parse(&event.event_type) {
            BillingEventType::CheckoutSessionCompleted => {
                let session: StripeCheckoutSession = decode_object(event, "checkout session")?;
                Ok(BillingEvent::CheckoutCompleted(CheckoutCompleted {
                    external_subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
                    metadata: checkout_metadata(&session.metadata, session.client_reference_id.as_deref()),
                    session_id: session.id,
                }))
            }
            BillingEventType::SubscriptionUpdated => {
                let sub: StripeSubscription = decode_object(event, "subscription")?;
                Ok(BillingEvent::SubscriptionUpdated(subscription_changed(sub)))
            }
            BillingEventType::SubscriptionDeleted => {
                let sub: StripeSubscription = decode_object(event, "subscription")?;
                Ok(BillingEvent::SubscriptionCancelled(subscription_changed(sub)))
            }
            BillingEventType::InvoicePaymentSucceeded => {
                let invoice: StripeInvoice = decode_object(event, "invoice")?;
                Ok(BillingEvent::PaymentSucceeded(invoice_payment(invoice)))
            }
            BillingEventType::InvoicePaymentFailed => {
                let invoice: StripeInvoice = decode_object(event, "invoice")?;
                Ok(BillingEvent::PaymentFailed(invoice_payment(invoice)))
            }
            BillingEventType::Unknown => Ok(BillingEvent::Unknown {
                event_type: event.event_type.clone(),
            }),
        }
    }

    pub fn event_type(&self) -> BillingEventType {
        match self {
            BillingEvent::CheckoutCompleted(_) => BillingEventType::CheckoutSessionCompleted,
            BillingEvent::SubscriptionUpdated(_) => BillingEventType::SubscriptionUpdated,
            BillingEvent::SubscriptionCancelled(_) => BillingEventType::SubscriptionDeleted,
            BillingEvent::PaymentSucceeded(_) => BillingEventType::InvoicePaymentSucceeded,
            BillingEvent::PaymentFailed(_) => BillingEventType::InvoicePaymentFailed,
            BillingEvent::Unknown { .. } => BillingEventType::Unknown,
        }
    }
}

fn decode_object<T: serde::de::DeserializeOwned>(
    event: &StripeEvent,
    what: &str,
) -> Result<T, WebhookError> {
    event
        .deserialize_object()
        .map_err(|e| WebhookError::ParseError(format!("Invalid {}: {}", what, e)))
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_owned)
}

fn metadata_value(metadata: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| non_empty(metadata.get(*key)))
}

/// Reads the `type` metadata. Missing or unrecognized values yield `None`.
fn metadata_kind(metadata: &HashMap<String, String>) -> Option<SubscriptionKind> {
    let raw = metadata_value(metadata, &["type"])?;
    match raw.parse() {
        Ok(kind) => Some(kind),
        Err(_) => {
            tracing::warn!(value = %raw, "Unrecognized subscription type in metadata");
            None
        }
    }
}

fn checkout_metadata(
    metadata: &HashMap<String, String>,
    client_reference_id: Option<&str>,
) -> CheckoutMetadata {
    let user_id = metadata_value(metadata, &["userId", "user_id"]).or_else(|| {
        client_reference_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    });

    CheckoutMetadata {
        user_id,
        kind: metadata_kind(metadata).unwrap_or(SubscriptionKind::Platform),
        tier_id: metadata_value(metadata, &["tierId", "tier_id"]),
        creator_id: metadata_value(metadata, &["creatorId", "creator_id"]),
    }
}

fn subscription_changed(sub: StripeSubscription) -> SubscriptionChanged {
    SubscriptionChanged {
        kind: metadata_kind(&sub.metadata),
        external_subscription_id: sub.id,
        processor_status: sub.status,
    }
}

fn invoice_payment(invoice: StripeInvoice) -> InvoicePayment {
    let kind = invoice
        .subscription_details
        .as_ref()
        .and_then(|details| metadata_kind(&details.metadata));

    InvoicePayment {
        external_subscription_id: invoice.subscription.as_ref().map(|s| s.id().to_string()),
        amount_cents: invoice.amount_paid,
        currency: invoice.currency,
        is_initial: invoice.billing_reason.as_deref() == Some("subscription_create"),
        invoice_id: invoice.id,
        kind,
    }
}
