//! In-memory knowledge store for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::store::KnowledgeStore;
use crate::types::record::StructuredRecord;

/// In-memory store of structured records.
///
/// Useful for testing and development. Not suitable for production as data
/// is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, StructuredRecord>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored records.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn upsert(&self, record: &StructuredRecord) -> Result<()> {
        // Last line of defense, independent of the extractor's validation.
        record.validate()?;
        self.records
            .write()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StructuredRecord>> {
        Ok(self.records.read().unwrap().get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<StructuredRecord>> {
        Ok(self.records.read().unwrap().values().cloned().collect())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.records.write().unwrap().remove(id);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().unwrap().len())
    }
}
