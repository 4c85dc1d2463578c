//! Search index trait - the capability set both retrieval backends share.
//!
//! The fusion algorithm is backend-agnostic: either index can be swapped for
//! an alternative implementation without touching retrieval logic.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::candidate::ScoredId;

/// A searchable index over record-derived text, keyed by record id.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index (or fully replace) the entry for an id.
    ///
    /// Atomic per id: concurrent searches observe either the prior entry or
    /// the new one, never a torn one.
    async fn index(&self, id: &str, text: &str) -> Result<()>;

    /// Remove the entry for an id, so replacement never leaves a stale
    /// duplicate searchable. Removing an absent id is not an error.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Top `limit` entries for the query, highest score first.
    ///
    /// Score scales are backend-specific and not comparable across indexes.
    /// An empty result is a valid outcome, not an error.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredId>>;

    /// Whether an entry exists for the id (consistency audits).
    async fn contains(&self, id: &str) -> Result<bool>;
}

#[async_trait]
impl<T: SearchIndex + ?Sized> SearchIndex for &T {
    async fn index(&self, id: &str, text: &str) -> Result<()> {
        (**self).index(id, text).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        (**self).remove(id).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredId>> {
        (**self).search(query, limit).await
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        (**self).contains(id).await
    }
}

#[async_trait]
impl<T: SearchIndex + ?Sized> SearchIndex for std::sync::Arc<T> {
    async fn index(&self, id: &str, text: &str) -> Result<()> {
        (**self).index(id, text).await
    }

    async fn remove(&self, id: &str) -> Result<()> {
        (**self).remove(id).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredId>> {
        (**self).search(query, limit).await
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        (**self).contains(id).await
    }
}
