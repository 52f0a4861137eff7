//! Subscription Engine - Entitlements and billing reconciliation
//!
//! Decides whether a user may see gated content, starts hosted checkouts for
//! platform and creator tiers, and turns billing processor webhooks into
//! subscription rows, premium flags and creator revenue counters.

pub mod adapters;
pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
