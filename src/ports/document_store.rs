use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for document store operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DocumentStoreError {
    /// No pooled connection became available in time
    #[error("Timed out after {0:?} waiting for a datastore connection")]
    PoolTimeout(std::time::Duration),

    /// The pool was shut down
    #[error("Datastore pool closed")]
    PoolClosed,
}

/// Result type for document store operations
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

/// A stored JSON document scoped to one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub body: serde_json::Value,
}

/// DocumentStore is the shared backing resource handed to data handlers.
///
/// Implementations hand out connections from a bounded pool; each call
/// acquires and releases its own connection.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn list(&self, collection: &str, owner_id: &str) -> DocumentStoreResult<Vec<Document>>;

    async fn get(
        &self,
        collection: &str,
        owner_id: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    async fn insert(
        &self,
        collection: &str,
        owner_id: &str,
        body: serde_json::Value,
    ) -> DocumentStoreResult<Document>;
}
