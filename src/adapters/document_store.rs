//! Pooled in-memory document store.
//!
//! Every operation checks out one of `pool_size` connections and gives up
//! after `acquire_timeout`, the same contract a networked datastore client
//! would present to handlers.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use eyre::{Result, WrapErr};
use scc::HashMap;
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{
    config::models::DatastoreConfig,
    ports::document_store::{Document, DocumentStore, DocumentStoreError, DocumentStoreResult},
};

/// (collection, owner, id)
type DocumentKey = (String, String, String);

pub struct MemoryDocumentStore {
    documents: HashMap<DocumentKey, Document>,
    pool: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl MemoryDocumentStore {
    pub fn new(pool_size: usize, acquire_timeout: Duration) -> Self {
        Self {
            documents: HashMap::new(),
            pool: Arc::new(Semaphore::new(pool_size)),
            acquire_timeout,
        }
    }

    pub fn from_config(config: &DatastoreConfig) -> Result<Self> {
        let acquire_timeout = humantime::parse_duration(&config.acquire_timeout).wrap_err_with(
            || format!("Invalid datastore.acquire_timeout '{}'", config.acquire_timeout),
        )?;
        Ok(Self::new(config.pool_size, acquire_timeout))
    }

    /// Connections currently free in the pool.
    pub fn available_connections(&self) -> usize {
        self.pool.available_permits()
    }

    async fn connection(&self) -> DocumentStoreResult<SemaphorePermit<'_>> {
        match tokio::time::timeout(self.acquire_timeout, self.pool.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(DocumentStoreError::PoolClosed),
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.acquire_timeout,
                    "Datastore pool exhausted"
                );
                Err(DocumentStoreError::PoolTimeout(self.acquire_timeout))
            }
        }
    }

    /// Stop handing out connections; pending and future operations fail.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: &str, owner_id: &str) -> DocumentStoreResult<Vec<Document>> {
        let _conn = self.connection().await?;

        let mut found = Vec::new();
        self.documents
            .retain_async(|(c, o, _), document| {
                if c == collection && o == owner_id {
                    found.push(document.clone());
                }
                true
            })
            .await;
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn get(
        &self,
        collection: &str,
        owner_id: &str,
        id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let _conn = self.connection().await?;

        let key = (collection.to_string(), owner_id.to_string(), id.to_string());
        Ok(self.documents.read_async(&key, |_, d| d.clone()).await)
    }

    async fn insert(
        &self,
        collection: &str,
        owner_id: &str,
        body: serde_json::Value,
    ) -> DocumentStoreResult<Document> {
        let _conn = self.connection().await?;

        let document = Document {
            id: uuid::Uuid::new_v4().simple().to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
            body,
        };
        let key = (
            collection.to_string(),
            owner_id.to_string(),
            document.id.clone(),
        );
        // v4 ids do not collide in practice; keep the first writer if one does.
        let _ = self.documents.insert_async(key, document.clone()).await;
        Ok(document)
    }
}
