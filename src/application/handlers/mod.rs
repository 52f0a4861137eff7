//! Application handlers.
//!
//! Command and query handlers grouped by domain.

pub mod subscription;
