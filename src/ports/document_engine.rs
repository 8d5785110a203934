use async_trait::async_trait;

use crate::domain::{Document, DocumentId, Filter, StoreError, StoredDocument, Update};

/// Port for the underlying document database
///
/// Engines assign ids in strictly increasing insertion order per process and
/// never reuse them; retention relies on that order to find the oldest documents.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    /// Insert one document and return its new id
    async fn insert_one(&self, collection: &str, document: Document) -> Result<DocumentId, StoreError>;

    /// Number of documents in the collection
    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    /// Ids of the `limit` oldest documents, ascending
    async fn oldest_ids(&self, collection: &str, limit: u64) -> Result<Vec<DocumentId>, StoreError>;

    /// Delete all listed ids in one operation, returning how many were removed
    async fn delete_many(&self, collection: &str, ids: &[DocumentId]) -> Result<u64, StoreError>;

    /// All documents matching the filter, in insertion order
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError>;

    /// First document matching the filter
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<StoredDocument>, StoreError>;

    /// Apply an update to the first match, returning the number modified (0 or 1)
    async fn update_one(&self, collection: &str, filter: &Filter, update: &Update) -> Result<u64, StoreError>;

    /// Delete the first match, returning the number deleted (0 or 1)
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Round-trip health probe
    async fn ping(&self) -> Result<(), StoreError>;
}
