//! Retrieval result types - transient, produced per query, never persisted.

use serde::{Deserialize, Serialize};

use super::record::StructuredRecord;

/// A scored id returned by a single search index.
///
/// Score scales differ between backends and are only comparable after
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub id: String,
    pub score: f32,
}

impl ScoredId {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// A fused retrieval candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCandidate {
    /// Id of the structured record
    pub record_id: String,

    /// Normalized lexical score in [0,1] (0.0 when absent from that set)
    pub lexical_score: f32,

    /// Normalized semantic score in [0,1] (0.0 when absent from that set)
    pub semantic_score: f32,

    /// Weighted combination of the two normalized scores
    pub fused_score: f32,

    /// 1-based position in the final ranking
    pub rank: usize,
}

/// A candidate paired with its stored payload.
///
/// This is the input contract of the downstream generation step: the ranked
/// candidates plus the structured records they point at. An empty sequence is
/// a valid outcome the consumer must handle ("no information found"), not an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub candidate: ContextCandidate,
    pub record: StructuredRecord,
}
