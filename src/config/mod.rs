//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `SUBSCRIPTION_ENGINE`
//! prefix and nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use subscription_engine::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod billing;
mod error;
mod server;
mod store;

pub use billing::{BillingConfig, BillingProcessorKind};
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, ServerConfig};
pub use store::{StoreBackend, StoreConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Document store backend and read-path retry settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Billing processor, webhook secret, prices and revenue share
    #[serde(default)]
    pub billing: BillingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `SUBSCRIPTION_ENGINE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `SUBSCRIPTION_ENGINE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SUBSCRIPTION_ENGINE__BILLING__STRIPE_API_KEY=...` -> `billing.stripe_api_key`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("SUBSCRIPTION_ENGINE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid value found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.store.validate()?;
        self.billing.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "SUBSCRIPTION_ENGINE__BILLING__STRIPE_API_KEY",
        "SUBSCRIPTION_ENGINE__BILLING__STRIPE_WEBHOOK_SECRET",
        "SUBSCRIPTION_ENGINE__BILLING__PRICE_PREMIUM_MONTHLY",
        "SUBSCRIPTION_ENGINE__BILLING__PRICE_PREMIUM_YEARLY",
        "SUBSCRIPTION_ENGINE__BILLING__CREATOR_SHARE",
        "SUBSCRIPTION_ENGINE__SERVER__PORT",
        "SUBSCRIPTION_ENGINE__SERVER__ENVIRONMENT",
        "SUBSCRIPTION_ENGINE__STORE__BACKEND",
        "SUBSCRIPTION_ENGINE__STORE__REDIS_URL",
    ];

    /// Helper to set environment variables for testing
    fn set_minimal_env() {
        env::set_var("SUBSCRIPTION_ENGINE__BILLING__STRIPE_API_KEY", "sk_test_xxx");
        env::set_var("SUBSCRIPTION_ENGINE__BILLING__STRIPE_WEBHOOK_SECRET", "whsec_xxx");
        env::set_var("SUBSCRIPTION_ENGINE__BILLING__PRICE_PREMIUM_MONTHLY", "price_m");
        env::set_var("SUBSCRIPTION_ENGINE__BILLING__PRICE_PREMIUM_YEARLY", "price_y");
    }

    /// Helper to clear environment variables after testing
    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.billing.stripe_webhook_secret, "whsec_xxx");
        assert_eq!(config.billing.price_premium_monthly.as_deref(), Some("price_m"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.billing.processor, BillingProcessorKind::Stripe);
        assert!((config.billing.creator_share - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("SUBSCRIPTION_ENGINE__SERVER__PORT", "3000");
        env::set_var("SUBSCRIPTION_ENGINE__SERVER__ENVIRONMENT", "production");
        env::set_var("SUBSCRIPTION_ENGINE__STORE__BACKEND", "redis");
        env::set_var("SUBSCRIPTION_ENGINE__STORE__REDIS_URL", "redis://localhost:6379");
        env::set_var("SUBSCRIPTION_ENGINE__BILLING__CREATOR_SHARE", "0.8");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.is_production());
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert!((config.billing.creator_share - 0.8).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_webhook_secret_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::remove_var("SUBSCRIPTION_ENGINE__BILLING__STRIPE_WEBHOOK_SECRET");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.validate().is_err());
    }
}
