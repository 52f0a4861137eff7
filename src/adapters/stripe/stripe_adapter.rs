//! Stripe billing processor adapter.
//!
//! Creates subscription-mode hosted checkout sessions. The checkout metadata
//! is written twice: on the session itself (read by
//! `checkout.session.completed`) and under `subscription_data[metadata]` so
//! the created subscription, and therefore its update, deletion and invoice
//! events, carries it as well.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{BillingError, BillingProcessor, CheckoutSession, CheckoutSessionRequest};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for the Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    request_timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct StripeSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Stripe implementation of [`BillingProcessor`].
pub struct StripeBillingAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeBillingAdapter {
    pub fn new(config: StripeConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
        }
    }
}

/// Form parameters for `POST /v1/checkout/sessions`.
fn checkout_params(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("line_items[0][price]".to_string(), request.price_ref.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "client_reference_id".to_string(),
            request.client_reference_id.clone(),
        ),
    ];

    for (key, value) in &request.metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
    }
    for (key, value) in &request.metadata {
        params.push((format!("subscription_data[metadata][{}]", key), value.clone()));
    }
    params
}

/// Maps a non-success Stripe response to a [`BillingError`].
fn error_from_response(status: reqwest::StatusCode, body: &str) -> BillingError {
    let parsed = serde_json::from_str::<StripeErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("Stripe API error ({})", status));

    let error = if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        BillingError::configuration(message)
    } else if status.is_server_error() {
        BillingError::network(message)
    } else {
        BillingError::provider(message)
    };

    match parsed.and_then(|e| e.error.code) {
        Some(code) => error.with_provider_code(code),
        None => error,
    }
}

#[async_trait]
impl BillingProcessor for StripeBillingAdapter {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);
        let params = checkout_params(&request);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(&params)
            .send()
            .await
            .map_err(|e| BillingError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = error_from_response(status, &body);
            tracing::warn!(
                status = %status,
                code = %error.code,
                provider_code = ?error.provider_code,
                "Stripe rejected checkout session"
            );
            return Err(error);
        }

        let session: StripeSessionResponse = response.json().await.map_err(|e| {
            BillingError::invalid_response(format!("Failed to parse Stripe response: {}", e))
        })?;

        tracing::info!(
            session_id = %session.id,
            client_reference_id = %request.client_reference_id,
            "Created checkout session"
        );

        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }
}

impl std::fmt::Debug for StripeBillingAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeBillingAdapter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
