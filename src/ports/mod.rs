//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `DocumentStore` - Raw key/value document store with field patches
//! - `SubscriptionStore` - Platform, creator and payment collections
//! - `UserAccounts` - Premium flag and creator profile on user records
//!
//! ## Billing Ports
//!
//! - `BillingProcessor` - Hosted checkout sessions at the payment processor

mod billing_processor;
mod document_store;
mod subscription_store;
mod user_accounts;

pub use billing_processor::{
    BillingError, BillingErrorCode, BillingProcessor, CheckoutSession, CheckoutSessionRequest,
};
pub use document_store::{DocumentPath, DocumentStore, FieldPatch, StoreError, StoredDocument};
pub use subscription_store::{PaymentRecordOutcome, SubscriptionPatch, SubscriptionStore};
pub use user_accounts::{UserAccount, UserAccounts};
