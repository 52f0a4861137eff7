//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the state machine contract and the error
//! vocabulary used by every other domain module.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{CreatorId, PaymentId, SubscriptionId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
