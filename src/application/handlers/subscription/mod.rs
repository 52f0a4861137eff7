//! Subscription handlers.
//!
//! ## Commands
//! - Starting a hosted checkout
//! - Processing billing processor webhooks
//! - Repairing premium flags
//!
//! ## Queries
//! - Access checks for gated content
//! - Subscription status
//! - User permissions summary

mod billing_event_reconciler;
mod check_access;
mod create_subscription;
mod get_subscription_status;
mod get_user_permissions;
mod handle_billing_webhook;
mod reconcile_premium_flags;

#[cfg(test)]
pub(crate) mod test_support;

pub use billing_event_reconciler::{BillingEventReconciler, ReconcileOutcome, DEFAULT_CREATOR_SHARE};

// Commands
pub use create_subscription::{
    CheckoutUrls, CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
};
pub use handle_billing_webhook::{
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, HandleBillingWebhookResult,
};
pub use reconcile_premium_flags::{
    ReconcilePremiumFlagsCommand, ReconcilePremiumFlagsHandler, ReconcilePremiumFlagsResult,
};

// Queries
pub use check_access::{CheckAccessHandler, CheckAccessQuery};
pub use get_subscription_status::{
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, GetSubscriptionStatusResult,
};
pub use get_user_permissions::{
    GetUserPermissionsHandler, GetUserPermissionsQuery, GetUserPermissionsResult,
};
