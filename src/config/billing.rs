//! Billing configuration (Stripe)

use serde::Deserialize;

use crate::domain::subscription::TierRegistry;

use super::error::ValidationError;

/// Which billing processor adapter to wire.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillingProcessorKind {
    #[default]
    Stripe,
    /// Local checkout stub; no money moves.
    Mock,
}

/// Billing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub processor: BillingProcessorKind,

    /// Stripe API key, required for the stripe processor
    #[serde(default)]
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    #[serde(default)]
    pub stripe_webhook_secret: String,

    #[serde(default = "default_api_base_url")]
    pub stripe_api_base_url: String,

    /// Where hosted checkout redirects after payment
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Where hosted checkout redirects when abandoned
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,

    pub price_premium_monthly: Option<String>,
    pub price_premium_yearly: Option<String>,
    pub price_creator_basic: Option<String>,
    pub price_creator_pro: Option<String>,
    pub price_creator_vip: Option<String>,

    /// Share of creator subscription payments credited to the creator
    #[serde(default = "default_creator_share")]
    pub creator_share: f64,

    /// Maximum age of a signed webhook in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,
}

impl BillingConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// The standard tier table with the configured prices attached.
    pub fn tier_registry(&self) -> TierRegistry {
        TierRegistry::standard()
            .with_price("premium-monthly", self.price_premium_monthly.clone())
            .with_price("premium-yearly", self.price_premium_yearly.clone())
            .with_price("creator-basic", self.price_creator_basic.clone())
            .with_price("creator-pro", self.price_creator_pro.clone())
            .with_price("creator-vip", self.price_creator_vip.clone())
    }

    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__STRIPE_WEBHOOK_SECRET"));
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }

        if self.processor == BillingProcessorKind::Stripe {
            if self.stripe_api_key.is_empty() {
                return Err(ValidationError::MissingRequired("BILLING__STRIPE_API_KEY"));
            }
            if !self.stripe_api_key.starts_with("sk_") {
                return Err(ValidationError::InvalidStripeKey);
            }
        }

        // Platform tiers must be purchasable; creator prices are optional.
        if is_blank(&self.price_premium_monthly) {
            return Err(ValidationError::MissingRequired("BILLING__PRICE_PREMIUM_MONTHLY"));
        }
        if is_blank(&self.price_premium_yearly) {
            return Err(ValidationError::MissingRequired("BILLING__PRICE_PREMIUM_YEARLY"));
        }

        if !(self.creator_share > 0.0 && self.creator_share <= 1.0) {
            return Err(ValidationError::InvalidCreatorShare);
        }
        if self.webhook_tolerance_secs <= 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        for (name, url) in [
            ("BILLING__SUCCESS_URL", &self.success_url),
            ("BILLING__CANCEL_URL", &self.cancel_url),
            ("BILLING__STRIPE_API_BASE_URL", &self.stripe_api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidUrl(name));
            }
        }

        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            processor: BillingProcessorKind::default(),
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base_url: default_api_base_url(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            price_premium_monthly: None,
            price_premium_yearly: None,
            price_creator_basic: None,
            price_creator_pro: None,
            price_creator_vip: None,
            creator_share: default_creator_share(),
            webhook_tolerance_secs: default_webhook_tolerance(),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_success_url() -> String {
    "http://localhost:3000/subscription/success?session_id={CHECKOUT_SESSION_ID}".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:3000/subscription/cancel".to_string()
}

fn default_creator_share() -> f64 {
    0.7
}

fn default_webhook_tolerance() -> i64 {
    300
}
