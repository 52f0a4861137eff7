//! HandleBillingWebhookHandler - Command handler for inbound processor webhooks.
//!
//! Verification happens before any parsing or state change. The returned
//! error decides the HTTP status and with it whether the processor retries.

use std::sync::Arc;

use crate::domain::billing::{BillingEvent, BillingEventType, WebhookError, WebhookSignatureVerifier};

use super::billing_event_reconciler::{BillingEventReconciler, ReconcileOutcome};

/// Command to handle a billing webhook.
#[derive(Debug, Clone)]
pub struct HandleBillingWebhookCommand {
    /// Raw request body, exactly as signed.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header value.
    pub signature: String,
}

/// Result of webhook processing.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleBillingWebhookResult {
    pub event_id: String,
    pub event_type: BillingEventType,
    pub outcome: ReconcileOutcome,
}

/// Handler for billing processor webhooks.
pub struct HandleBillingWebhookHandler {
    verifier: Arc<WebhookSignatureVerifier>,
    reconciler: Arc<BillingEventReconciler>,
}

impl HandleBillingWebhookHandler {
    pub fn new(verifier: Arc<WebhookSignatureVerifier>, reconciler: Arc<BillingEventReconciler>) -> Self {
        Self {
            verifier,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleBillingWebhookCommand,
    ) -> Result<HandleBillingWebhookResult, WebhookError> {
        // 1. Verify signature and parse envelope
        let event = self.verifier.verify_and_parse(&cmd.payload, &cmd.signature)?;

        // 2. Decode the typed payload
        let decoded = BillingEvent::decode(&event).map_err(|err| {
            tracing::warn!(event_id = %event.id, event_type = %event.event_type, error = %err, "Malformed webhook event");
            err
        })?;
        let event_type = decoded.event_type();

        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Webhook verified");

        // 3. Reconcile
        match self.reconciler.reconcile(decoded).await {
            Ok(outcome) => {
                tracing::info!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    outcome = outcome.label(),
                    "Webhook processed"
                );
                Ok(HandleBillingWebhookResult {
                    event_id: event.id,
                    event_type,
                    outcome,
                })
            }
            Err(err) => {
                if err.is_retryable() {
                    tracing::error!(event_id = %event.id, event_type = %event.event_type, error = %err, "Webhook processing failed, processor will retry");
                } else {
                    tracing::warn!(event_id = %event.id, event_type = %event.event_type, error = %err, "Webhook event rejected");
                }
                Err(err)
            }
        }
    }
}
