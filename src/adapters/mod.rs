//! Adapters - Implementations of port interfaces.
//!
//! - `store` - Document store backends (in-memory, Redis)
//! - `subscription` - Subscription and user-account stores over documents
//! - `stripe` - Billing processor client
//! - `http` - REST API

pub mod http;
pub mod store;
pub mod stripe;
pub mod subscription;
