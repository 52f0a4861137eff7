//! Axum router configuration for subscription endpoints.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    check_access, create_subscription, get_subscription_status, get_user_permissions,
    handle_stripe_webhook, reconcile_premium, SubscriptionAppState,
};

/// Subscription routes, mounted at `/api/subscriptions`.
///
/// # Routes
/// - `POST /` - Start a hosted checkout
/// - `POST /check-access` - Evaluate access to gated content
/// - `GET /status` - Active subscriptions of the caller
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/", post(create_subscription))
        .route("/check-access", post(check_access))
        .route("/status", get(get_subscription_status))
}

/// User routes, mounted at `/api/users`.
pub fn user_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/permissions", get(get_user_permissions))
}

/// Admin routes, mounted at `/api/admin`.
pub fn admin_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/reconcile-premium", post(reconcile_premium))
}

/// Webhook routes, mounted at `/api/webhooks`.
///
/// These don't require user authentication; they're verified via signature.
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Complete API router with tracing and a per-request timeout.
pub fn subscription_router(state: SubscriptionAppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/subscriptions", subscription_routes())
        .nest("/api/users", user_routes())
        .nest("/api/admin", admin_routes())
        .nest("/api/webhooks", webhook_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
