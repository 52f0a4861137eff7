//! Subscription and user-account adapters over the document store.

mod document_subscription_store;
mod document_user_accounts;
mod documents;

pub use document_subscription_store::DocumentSubscriptionStore;
pub use document_user_accounts::{DocumentUserAccounts, USERS_COLLECTION};
pub use documents::{
    CREATOR_COLLECTION, INDEXED_FIELDS, PAYMENT_COLLECTION, PLATFORM_COLLECTION,
};
