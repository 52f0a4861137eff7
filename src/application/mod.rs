//! Application layer - Commands, Queries, and Handlers.
//!
//! Handlers orchestrate domain rules over the ports. Commands change state;
//! queries only read and degrade instead of failing.

pub mod handlers;
mod retry;

pub use retry::RetryPolicy;

pub use handlers::subscription::{
    BillingEventReconciler, CheckAccessHandler, CheckAccessQuery, CheckoutUrls,
    CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, GetSubscriptionStatusResult,
    GetUserPermissionsHandler, GetUserPermissionsQuery, GetUserPermissionsResult,
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, HandleBillingWebhookResult,
    ReconcileOutcome, ReconcilePremiumFlagsCommand, ReconcilePremiumFlagsHandler,
    ReconcilePremiumFlagsResult, DEFAULT_CREATOR_SHARE,
};
