//! Knowledge store trait - the durable structured-record store.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::record::StructuredRecord;

/// Durable store of validated structured records, keyed by record id.
///
/// The store is the source of truth; both search indexes are derived state
/// and must be rebuildable from `all()` alone.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Insert or fully replace the record for its id.
    ///
    /// Atomic per id: readers see either the prior record or the new one,
    /// never a partial update. Same-id writes serialize; distinct ids may
    /// proceed concurrently. Implementations re-validate the record's
    /// cross-field invariants at this boundary, independent of the
    /// extractor's own validation.
    async fn upsert(&self, record: &StructuredRecord) -> Result<()>;

    /// Fetch a record by id.
    async fn get(&self, id: &str) -> Result<Option<StructuredRecord>>;

    /// All stored records, in no particular order.
    async fn all(&self) -> Result<Vec<StructuredRecord>>;

    /// Remove a record by id. Removing an absent id is not an error.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize> {
        Ok(self.all().await?.len())
    }
}

#[async_trait]
impl<T: KnowledgeStore + ?Sized> KnowledgeStore for &T {
    async fn upsert(&self, record: &StructuredRecord) -> Result<()> {
        (**self).upsert(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<StructuredRecord>> {
        (**self).get(id).await
    }

    async fn all(&self) -> Result<Vec<StructuredRecord>> {
        (**self).all().await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        (**self).remove(id).await
    }
}

#[async_trait]
impl<T: KnowledgeStore + ?Sized> KnowledgeStore for std::sync::Arc<T> {
    async fn upsert(&self, record: &StructuredRecord) -> Result<()> {
        (**self).upsert(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<StructuredRecord>> {
        (**self).get(id).await
    }

    async fn all(&self) -> Result<Vec<StructuredRecord>> {
        (**self).all().await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        (**self).remove(id).await
    }
}
