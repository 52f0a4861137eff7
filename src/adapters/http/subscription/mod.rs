//! HTTP adapter for subscription endpoints.
//!
//! - `POST /api/subscriptions` - Start a hosted checkout
//! - `POST /api/subscriptions/check-access` - Evaluate access to gated content
//! - `GET /api/subscriptions/status` - Caller's active subscriptions
//! - `GET /api/users/permissions` - Premium flag and creator profile
//! - `POST /api/admin/reconcile-premium` - Recompute stale premium flags
//! - `POST /api/webhooks/stripe` - Billing processor webhooks

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::ErrorResponse;
pub use handlers::{AuthenticatedUser, SubscriptionAppState};
pub use routes::subscription_router;
