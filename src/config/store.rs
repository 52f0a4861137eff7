//! Document store configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Which document store backs the subscription collections.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local; contents are lost on restart.
    #[default]
    Memory,
    Redis,
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL, required for the redis backend
    pub redis_url: Option<String>,

    /// Key prefix for every document
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    /// Attempts per read on access-check paths
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Backoff step in milliseconds; attempt `n` waits `n * step`
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl StoreConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate store configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backend == StoreBackend::Redis {
            let url = self
                .redis_url
                .as_deref()
                .filter(|url| !url.is_empty())
                .ok_or(ValidationError::MissingRequired("STORE__REDIS_URL"))?;
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ValidationError::InvalidRedisUrl);
            }
        }
        if self.namespace.trim().is_empty() {
            return Err(ValidationError::MissingRequired("STORE__NAMESPACE"));
        }
        if self.call_timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: None,
            namespace: default_namespace(),
            call_timeout_ms: default_call_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_namespace() -> String {
    "subscriptions".to_string()
}

fn default_call_timeout() -> u64 {
    5_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    200
}
