use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::domain::{Document, DocumentId, Filter, RetentionPolicy, StoreError, StoredDocument, Update};
use crate::ports::DocumentEngine;

/// Document store that keeps every collection at or below the policy limit.
///
/// Insert and the retention pass that follows it are separate engine calls.
/// Two concurrent inserts into the same collection can both read a stale
/// count, so the bound converges on the next pass rather than holding at
/// every instant.
pub struct RetentionStore {
    engine: Arc<dyn DocumentEngine>,
    policy: RetentionPolicy,
}

impl RetentionStore {
    pub fn new(engine: Arc<dyn DocumentEngine>, policy: RetentionPolicy) -> Self {
        info!(
            "Retention store ready (limit {}, batch size {})",
            policy.limit(),
            policy.batch_size()
        );
        Self { engine, policy }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Insert a document, then run a retention pass on its collection.
    ///
    /// A failed retention pass is logged and does not fail the insert.
    pub async fn insert(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError> {
        let id = self.engine.insert_one(collection, document).await.map_err(|e| {
            error!("Error inserting document into {}: {}", collection, e);
            e
        })?;
        info!("Inserted document with id {} into {}", id, collection);

        if let Err(e) = self.retain(collection).await {
            error!("Error in data retention process for {}: {}", collection, e);
        }
        Ok(id)
    }

    /// Evict the oldest documents until the collection is back at the limit.
    ///
    /// Returns how many documents were deleted. Every excess document is
    /// removed in this one pass regardless of the advisory batch size.
    pub async fn retain(&self, collection: &str) -> Result<u64, StoreError> {
        let count = self.engine.count(collection).await?;
        debug!("Collection '{}' has {} documents", collection, count);

        let excess = self.policy.excess(count);
        if excess == 0 {
            return Ok(0);
        }

        info!(
            "Document count {} exceeds retention limit {}. Deleting {} oldest records...",
            count,
            self.policy.limit(),
            excess
        );
        let oldest = self.engine.oldest_ids(collection, excess).await?;
        if oldest.is_empty() {
            warn!("No documents found to delete for retention in {}", collection);
            return Ok(0);
        }

        let deleted = self.engine.delete_many(collection, &oldest).await?;
        info!("Deleted {} documents from {}", deleted, collection);
        Ok(deleted)
    }

    pub async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<StoredDocument>, StoreError> {
        self.engine.find_one(collection, filter).await
    }

    /// Every match, oldest first
    pub async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        self.engine.find(collection, filter).await
    }

    pub async fn update(&self, collection: &str, filter: &Filter, update: &Update) -> Result<u64, StoreError> {
        let modified = self.engine.update_one(collection, filter, update).await?;
        info!("Updated {} document(s) in {}", modified, collection);
        Ok(modified)
    }

    pub async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let deleted = self.engine.delete_one(collection, filter).await?;
        info!("Deleted {} document(s) from {}", deleted, collection);
        Ok(deleted)
    }

    pub async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        self.engine.count(collection).await
    }

    /// Health probe; failures are logged, never returned
    pub async fn verify_connection(&self) -> bool {
        match self.engine.ping().await {
            Ok(()) => {
                info!("Document store connection verified");
                true
            }
            Err(e) => {
                error!("Document store connection failed: {}", e);
                false
            }
        }
    }
}
