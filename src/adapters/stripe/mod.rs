//! Stripe billing processor adapter.
//!
//! Implements the `BillingProcessor` port for Stripe hosted checkout.
//! Inbound webhooks are verified and decoded in `domain::billing`.
//!
//! # Security
//!
//! - The API key is held as a `secrecy::SecretString` and redacted from
//!   `Debug` output

mod mock_billing_processor;
mod stripe_adapter;

pub use mock_billing_processor::MockBillingProcessor;
pub use stripe_adapter::{StripeBillingAdapter, StripeConfig};
