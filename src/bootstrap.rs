//! Wiring from configuration to concrete adapters.
//!
//! Kept in the library so integration tests can build the same state the
//! binary serves.

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

use crate::adapters::http::SubscriptionAppState;
use crate::adapters::store::{InMemoryDocumentStore, RedisDocumentStore};
use crate::adapters::stripe::{MockBillingProcessor, StripeBillingAdapter, StripeConfig};
use crate::adapters::subscription::{
    DocumentSubscriptionStore, DocumentUserAccounts, INDEXED_FIELDS,
};
use crate::application::{BillingEventReconciler, CheckoutUrls, RetryPolicy};
use crate::config::{
    AppConfig, BillingConfig, BillingProcessorKind, ConfigError, StoreBackend, StoreConfig,
    ValidationError,
};
use crate::domain::billing::WebhookSignatureVerifier;
use crate::ports::{BillingProcessor, DocumentStore, StoreError};

/// Base URL for the mock processor's fake hosted checkout pages.
const MOCK_CHECKOUT_BASE_URL: &str = "http://localhost:3000/mock-checkout";

/// Errors that stop the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Document store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens the configured document store with the lookup indexes registered.
pub async fn build_document_store(
    config: &StoreConfig,
) -> Result<Arc<dyn DocumentStore>, StartupError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory document store, data is lost on restart");
            let store = INDEXED_FIELDS
                .iter()
                .fold(InMemoryDocumentStore::new(), |store, (collection, field)| {
                    store.with_index(collection, field)
                });
            Ok(Arc::new(store))
        }
        StoreBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or(ValidationError::MissingRequired("STORE__REDIS_URL"))?;
            let store = RedisDocumentStore::connect(url, config.namespace.clone()).await?;
            let store = INDEXED_FIELDS
                .iter()
                .fold(store, |store, (collection, field)| {
                    store.with_index(collection, field)
                });
            tracing::info!(namespace = %config.namespace, "Connected to Redis document store");
            Ok(Arc::new(store))
        }
    }
}

/// Builds the configured billing processor client.
pub fn build_billing_processor(config: &BillingConfig) -> Arc<dyn BillingProcessor> {
    match config.processor {
        BillingProcessorKind::Stripe => {
            if config.is_test_mode() {
                tracing::info!("Stripe client in test mode");
            }
            let stripe = StripeConfig::new(config.stripe_api_key.clone())
                .with_base_url(config.stripe_api_base_url.clone());
            Arc::new(StripeBillingAdapter::new(stripe))
        }
        BillingProcessorKind::Mock => {
            tracing::warn!("Using mock billing processor, checkouts are not real");
            Arc::new(MockBillingProcessor::new().with_checkout_base_url(MOCK_CHECKOUT_BASE_URL))
        }
    }
}

/// Builds the HTTP state over an already opened document store.
pub fn build_state_with_store(
    config: &AppConfig,
    docs: Arc<dyn DocumentStore>,
) -> SubscriptionAppState {
    let store = Arc::new(DocumentSubscriptionStore::new(docs.clone()));
    let accounts = Arc::new(DocumentUserAccounts::new(docs));
    let tiers = Arc::new(config.billing.tier_registry());

    let retry = RetryPolicy::new(
        config.store.retry_attempts,
        config.store.retry_backoff(),
        config.store.call_timeout(),
    );

    let reconciler = BillingEventReconciler::new(store.clone(), accounts.clone(), tiers.clone())
        .with_creator_share(config.billing.creator_share)
        .with_call_timeout(config.store.call_timeout());

    let verifier = WebhookSignatureVerifier::new(SecretString::new(
        config.billing.stripe_webhook_secret.clone(),
    ))
    .with_tolerance_secs(config.billing.webhook_tolerance_secs);

    SubscriptionAppState {
        store,
        accounts,
        billing: build_billing_processor(&config.billing),
        tiers,
        checkout_urls: CheckoutUrls {
            success_url: config.billing.success_url.clone(),
            cancel_url: config.billing.cancel_url.clone(),
        },
        retry,
        verifier: Arc::new(verifier),
        reconciler: Arc::new(reconciler),
    }
}

/// Opens the store and builds the HTTP state.
pub async fn build_state(config: &AppConfig) -> Result<SubscriptionAppState, StartupError> {
    let docs = build_document_store(&config.store).await?;
    Ok(build_state_with_store(config, docs))
}
