//! Mock billing processor for tests and local development.
//!
//! Returns deterministic session ids (`cs_mock_1`, `cs_mock_2`, ...),
//! records every request, and can be told to fail the next call.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ports::{BillingError, BillingProcessor, CheckoutSession, CheckoutSessionRequest};

#[derive(Default)]
struct MockState {
    requests: Vec<CheckoutSessionRequest>,
    next_error: Option<BillingError>,
    sessions_created: u64,
}

/// In-process [`BillingProcessor`].
#[derive(Clone, Default)]
pub struct MockBillingProcessor {
    inner: Arc<Mutex<MockState>>,
    checkout_base_url: Option<String>,
}

impl MockBillingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosted checkout URLs become `{base}/{session_id}`.
    pub fn with_checkout_base_url(mut self, base: impl Into<String>) -> Self {
        self.checkout_base_url = Some(base.into());
        self
    }

    /// Fails the next call with `error`.
    pub fn fail_next(&self, error: BillingError) {
        if let Ok(mut state) = self.inner.lock() {
            state.next_error = Some(error);
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.inner
            .lock()
            .map(|state| state.requests.clone())
            .unwrap_or_default()
    }

    pub fn last_request(&self) -> Option<CheckoutSessionRequest> {
        self.requests().pop()
    }
}

#[async_trait]
impl BillingProcessor for MockBillingProcessor {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| BillingError::provider("mock state poisoned"))?;

        state.requests.push(request);
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }

        state.sessions_created += 1;
        let id = format!("cs_mock_{}", state.sessions_created);
        let url = self
            .checkout_base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), id));

        Ok(CheckoutSession { id, url })
    }
}

impl std::fmt::Debug for MockBillingProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBillingProcessor")
            .field("checkout_base_url", &self.checkout_base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request(user: &str) -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            price_ref: "price_1".to_string(),
            success_url: "https://app.test/ok".to_string(),
            cancel_url: "https://app.test/cancel".to_string(),
            client_reference_id: user.to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn sessions_get_sequential_ids() {
        let mock = MockBillingProcessor::new().with_checkout_base_url("https://pay.test/");

        let first = mock.create_checkout_session(request("u1")).await.unwrap();
        let second = mock.create_checkout_session(request("u2")).await.unwrap();

        assert_eq!(first.id, "cs_mock_1");
        assert_eq!(second.url.as_deref(), Some("https://pay.test/cs_mock_2"));
        assert_eq!(mock.requests().len(), 2);
        assert_eq!(mock.last_request().unwrap().client_reference_id, "u2");
    }

    #[tokio::test]
    async fn injected_error_fails_only_the_next_call() {
        let mock = MockBillingProcessor::new();
        mock.fail_next(BillingError::network("down"));

        assert!(mock.create_checkout_session(request("u1")).await.is_err());
        assert!(mock.create_checkout_session(request("u1")).await.is_ok());
    }
}
