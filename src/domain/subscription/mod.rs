//! Subscription domain.
//!
//! Two subscription domains share one tier hierarchy:
//! - platform subscriptions grant access to everything and drive the
//!   user's premium flag;
//! - creator subscriptions grant access to one creator's content up to the
//!   held tier and drive that creator's subscriber count and earnings.

mod access;
mod aggregate;
mod errors;
mod lifecycle;
mod payment;
mod profile;
mod status;
mod tier;

pub use access::{AccessDecision, GrantedVia};
pub use aggregate::{CreatorSubscription, PlatformSubscription};
pub use errors::SubscriptionError;
pub use lifecycle::SubscriptionLifecycle;
pub use payment::SubscriptionPayment;
pub use profile::CreatorProfile;
pub use status::{PaymentStatus, SubscriptionKind, SubscriptionStatus};
pub use tier::{TierDefinition, TierNotFound, TierRegistry, TierScope};
