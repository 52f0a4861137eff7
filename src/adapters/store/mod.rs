//! Document store adapters.

mod in_memory;
mod patch;
mod redis;

pub use in_memory::InMemoryDocumentStore;
pub use patch::apply_patch;
pub use self::redis::RedisDocumentStore;
