//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `subscription` - Tiers, subscription aggregates and access decisions
//! - `billing` - Webhook verification and typed billing events

pub mod billing;
pub mod foundation;
pub mod subscription;
