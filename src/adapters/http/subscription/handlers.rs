//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::application::{
    BillingEventReconciler, CheckAccessHandler, CheckAccessQuery, CheckoutUrls,
    CreateSubscriptionCommand, CreateSubscriptionHandler, GetSubscriptionStatusHandler,
    GetSubscriptionStatusQuery, GetUserPermissionsHandler, GetUserPermissionsQuery,
    HandleBillingWebhookCommand, HandleBillingWebhookHandler, ReconcilePremiumFlagsCommand,
    ReconcilePremiumFlagsHandler, RetryPolicy,
};
use crate::domain::billing::{WebhookError, WebhookSignatureVerifier};
use crate::domain::foundation::{CreatorId, ErrorCode, UserId};
use crate::domain::subscription::{SubscriptionError, TierRegistry};
use crate::ports::{BillingProcessor, SubscriptionStore, UserAccounts};

use super::dto::{
    CheckAccessRequest, CheckAccessResponse, CreateSubscriptionRequest,
    CreateSubscriptionResponse, ErrorResponse, ReconcilePremiumRequest, ReconcilePremiumResponse,
    SubscriptionStatusResponse, UserPermissionsResponse,
};

/// Header carrying the processor's webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Header carrying the caller's id, set by the identity provider in front
/// of this service.
pub const USER_ID_HEADER: &str = "X-User-Id";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned for each request; handlers are built on demand from the Arcs.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub accounts: Arc<dyn UserAccounts>,
    pub billing: Arc<dyn BillingProcessor>,
    pub tiers: Arc<TierRegistry>,
    pub checkout_urls: CheckoutUrls,
    /// Retry policy for read paths.
    pub retry: RetryPolicy,
    pub verifier: Arc<WebhookSignatureVerifier>,
    pub reconciler: Arc<BillingEventReconciler>,
}

impl SubscriptionAppState {
    pub fn check_access_handler(&self) -> CheckAccessHandler {
        CheckAccessHandler::new(self.store.clone(), self.tiers.clone()).with_retry(self.retry)
    }

    pub fn create_subscription_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.billing.clone(),
            self.tiers.clone(),
            self.checkout_urls.clone(),
        )
    }

    pub fn subscription_status_handler(&self) -> GetSubscriptionStatusHandler {
        GetSubscriptionStatusHandler::new(self.store.clone()).with_retry(self.retry)
    }

    pub fn user_permissions_handler(&self) -> GetUserPermissionsHandler {
        GetUserPermissionsHandler::new(self.store.clone(), self.accounts.clone())
            .with_retry(self.retry)
    }

    pub fn reconcile_premium_handler(&self) -> ReconcilePremiumFlagsHandler {
        ReconcilePremiumFlagsHandler::new(self.store.clone(), self.accounts.clone())
    }

    pub fn webhook_handler(&self) -> HandleBillingWebhookHandler {
        HandleBillingWebhookHandler::new(self.verifier.clone(), self.reconciler.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Authentication
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity taken from the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s.trim()).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions/check-access - Evaluate access to gated content
///
/// Always answers 200; failures inside the evaluator surface as a denial.
pub async fn check_access(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let request: CheckAccessRequest = parse_optional_json(&body)?;

    let creator_id = request
        .creator_id
        .filter(|id| !id.trim().is_empty())
        .map(CreatorId::new)
        .transpose()
        .map_err(SubscriptionError::from)?;

    let query = CheckAccessQuery {
        user_id: user.user_id,
        creator_id,
        required_tier: request.required_tier,
    };

    let decision = state.check_access_handler().handle(query).await;
    Ok(Json(CheckAccessResponse::from(decision)))
}

/// GET /api/subscriptions/status - Active subscriptions of the caller
pub async fn get_subscription_status(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let query = GetSubscriptionStatusQuery {
        user_id: user.user_id,
    };

    let result = state.subscription_status_handler().handle(query).await;
    Json(SubscriptionStatusResponse::from(result))
}

/// GET /api/users/permissions - Premium flag, creator profile and held tiers
pub async fn get_user_permissions(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    let query = GetUserPermissionsQuery {
        user_id: user.user_id,
    };

    let result = state.user_permissions_handler().handle(query).await;
    Json(UserPermissionsResponse::from(result))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions - Start a hosted checkout
pub async fn create_subscription(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let request: CreateSubscriptionRequest = parse_json(&body)?;

    let cmd = CreateSubscriptionCommand {
        user_id: user.user_id,
        kind: request.kind,
        tier_id: request.tier_id,
        creator_id: request.creator_id,
    };

    let result = state.create_subscription_handler().handle(cmd).await?;
    Ok(Json(CreateSubscriptionResponse::from(result)))
}

/// POST /api/admin/reconcile-premium - Recompute stale premium flags
pub async fn reconcile_premium(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    body: Bytes,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let request: ReconcilePremiumRequest = parse_optional_json(&body)?;

    let target = request
        .user_id
        .map(UserId::new)
        .transpose()
        .map_err(SubscriptionError::from)?;

    tracing::info!(
        requested_by = %user.user_id,
        target = target.as_ref().map(UserId::as_str).unwrap_or("all"),
        "Premium flag reconciliation requested"
    );

    let result = state
        .reconcile_premium_handler()
        .handle(ReconcilePremiumFlagsCommand { user_id: target })
        .await?;
    Ok(Json(ReconcilePremiumResponse::from(result)))
}

/// POST /api/webhooks/stripe - Billing processor events
///
/// No user authentication; the signature header is the credential.
pub async fn handle_stripe_webhook(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| WebhookError::ParseError("Missing Stripe-Signature header".to_string()))?;

    let cmd = HandleBillingWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    state.webhook_handler().handle(cmd).await?;

    Ok((StatusCode::OK, "Webhook received"))
}

// ════════════════════════════════════════════════════════════════════════════════
// Body Parsing
// ════════════════════════════════════════════════════════════════════════════════

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, SubscriptionError> {
    serde_json::from_slice(body)
        .map_err(|err| SubscriptionError::invalid_request(format!("Invalid request body: {}", err)))
}

/// Like [`parse_json`], but an empty body yields the default request.
fn parse_optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, SubscriptionError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_json(body)
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct SubscriptionApiError(SubscriptionError);

impl From<SubscriptionError> for SubscriptionApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = match code {
            ErrorCode::InvalidRequest | ErrorCode::InvalidTier | ErrorCode::MissingCreatorId => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::StripeSessionError => StatusCode::BAD_GATEWAY,
            ErrorCode::StripeConfigError
            | ErrorCode::InvalidStateTransition
            | ErrorCode::StoreError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(code = %code, error = %self.0, "Subscription request failed");
        }

        let body = ErrorResponse::new(code.to_string(), self.0.message());
        (status, Json(body)).into_response()
    }
}

/// Webhook error wrapper. The status code decides redelivery.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = if status.is_server_error() {
            ErrorResponse::new(ErrorCode::InternalError.to_string(), "Webhook processing failed")
        } else {
            ErrorResponse::new("WEBHOOK_REJECTED", self.0.to_string())
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_request() {
        let response = SubscriptionApiError::from(SubscriptionError::MissingCreatorId).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            SubscriptionApiError::from(SubscriptionError::invalid_tier("gold")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn session_failure_is_bad_gateway() {
        let response =
            SubscriptionApiError::from(SubscriptionError::checkout_session("down")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn billing_config_failure_is_server_error() {
        let response =
            SubscriptionApiError::from(SubscriptionError::billing_config("no key")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn webhook_store_failure_is_server_error() {
        let response = WebhookApiError::from(WebhookError::Store("timeout".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = WebhookApiError::from(WebhookError::InvalidSignature).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn empty_optional_body_uses_default() {
        let request: CheckAccessRequest = parse_optional_json(b"  ").unwrap();
        assert!(request.creator_id.is_none());
        assert!(request.required_tier.is_none());
    }

    #[test]
    fn malformed_body_is_invalid_request() {
        let err = parse_json::<CreateSubscriptionRequest>(b"{\"tierId\": 3}").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}
