//! Document Store Port - Interface for the shared key/value document store.
//!
//! The store offers single-document atomicity only. There are no
//! multi-document transactions; callers that touch several documents accept
//! that a failure between writes leaves them partially applied.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Location of one document: `{collection}/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document together with its id inside the collection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Value,
}

/// Field-level patch. Keys are field paths; nested fields use `/`
/// (`creatorProfile/subscriberCount`). `null` values delete.
pub type FieldPatch = Map<String, Value>;

/// Errors that can occur during document store operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Equality queries on this field are not indexed. Callers fall back to
    /// a full scan.
    #[error("Index not defined for {collection}.{field}")]
    IndexUnavailable { collection: String, field: String },

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn index_unavailable(collection: impl Into<String>, field: impl Into<String>) -> Self {
        StoreError::IndexUnavailable {
            collection: collection.into(),
            field: field.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend(message.into())
    }

    /// True for the index-unavailable class, including backends that only
    /// report it as message text.
    pub fn is_index_unavailable(&self) -> bool {
        match self {
            StoreError::IndexUnavailable { .. } => true,
            StoreError::Backend(message) => {
                message.contains("Index not defined") || message.contains(".indexOn")
            }
            _ => false,
        }
    }

    /// Errors worth retrying on read paths.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Backend(_)) || self.is_index_unavailable()
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Port for the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document. `Ok(None)` when it does not exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Value>, StoreError>;

    /// Replaces the whole document.
    async fn set(&self, path: &DocumentPath, value: Value) -> Result<(), StoreError>;

    /// Writes the listed fields, leaving others untouched. A `null` value
    /// removes the field. Creates the document when it does not exist.
    /// Applied atomically per document.
    async fn update(&self, path: &DocumentPath, patch: FieldPatch) -> Result<(), StoreError>;

    /// Equality query on a top-level field.
    ///
    /// # Errors
    /// `StoreError::IndexUnavailable` when the field is not indexed.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Every document in the collection.
    async fn scan_all(&self, collection: &str) -> Result<Vec<StoredDocument>, StoreError>;
}
