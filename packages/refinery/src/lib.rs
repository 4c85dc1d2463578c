//! Course Knowledge Refinement & Hybrid Retrieval Library
//!
//! Turns unstructured course records (announcements, assignments, syllabi)
//! collected by an external crawler into schema-validated structured facts,
//! keeps a structured store plus two derived search indexes, and answers
//! natural-language questions by fusing lexical and semantic retrieval into
//! one ranked context set for a downstream generation step.
//!
//! # Design Philosophy
//!
//! **"Model output is untrusted input"**
//!
//! - Every structuring payload passes a hard validation boundary
//! - Relative dates resolve against the record's publication time, never
//!   the wall clock, so re-extraction replays deterministically
//! - The knowledge store is the source of truth; indexes are derived state
//! - Library handles mechanics; answer composition belongs to the consumer
//!
//! # Usage
//!
//! ```rust,ignore
//! use refinery::{
//!     ingest_batch, FactExtractor, HybridRetriever, LexicalIndex, MemoryStore,
//!     PipelineConfig, SemanticIndex,
//! };
//! use refinery::testing::{MockEmbedder, MockStructurer};
//!
//! let extractor = FactExtractor::new(MockStructurer::new());
//! let store = MemoryStore::new();
//! let semantic = SemanticIndex::new(MockEmbedder::new());
//! let lexical = LexicalIndex::new();
//!
//! let report = ingest_batch(&raws, &PipelineConfig::default(), &extractor, &store, &semantic, &lexical).await;
//!
//! let retriever = HybridRetriever::new(&semantic, &lexical, &store);
//! let context = retriever.retrieve_with_records("3주차 과제", 5).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (Structurer, Embedder, KnowledgeStore, SearchIndex)
//! - [`types`] - Record, candidate, and configuration types
//! - [`temporal`] - Relative date resolution anchored to publication time
//! - [`extractor`] - Fact extraction with schema validation and repair
//! - [`index`] - Lexical (BM25) and semantic (cosine) indexes
//! - [`retriever`] - Hybrid fusion retrieval
//! - [`pipeline`] - Batch ingestion coordinator and index repair
//! - [`stores`] - Store implementations (MemoryStore, SqliteStore)
//! - [`briefing`] - Deadline briefing over stored records
//! - [`testing`] - Mock implementations for testing

pub mod briefing;
pub mod error;
pub mod extractor;
pub mod index;
pub mod pipeline;
pub mod retriever;
pub mod stores;
pub mod temporal;
pub mod testing;
pub mod throttle;
pub mod traits;
pub mod types;

#[cfg(feature = "ollama")]
pub mod ai;

// Re-export core types at crate root
pub use error::{RefineryError, Result, SchemaViolation};
pub use traits::{
    embedder::Embedder,
    index::SearchIndex,
    store::KnowledgeStore,
    structurer::{StructureRequest, StructuredPayload, Structurer},
};
pub use types::{
    candidate::{ContextCandidate, RetrievedContext, ScoredId},
    config::{ExtractorConfig, FusionConfig, PipelineConfig},
    record::{Category, RawRecord, StructuredRecord},
};

// Re-export the resolver
pub use temporal::{resolve, Resolution};

// Re-export extraction
pub use extractor::{structure_instruction, validate_payload, FactExtractor};

// Re-export retrieval
pub use index::{LexicalIndex, SemanticIndex};
pub use retriever::HybridRetriever;

// Re-export the pipeline
pub use pipeline::{
    find_unindexed, ingest_batch, ingest_batch_cancellable, rebuild_indexes, repair_pass,
    IngestReport, RecordOutcome, RecordState,
};

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

// Re-export briefing
pub use briefing::{upcoming_deadlines, BriefingItem, BriefingWindow};

// Re-export throttling
pub use throttle::RateLimitedStructurer;

#[cfg(feature = "ollama")]
pub use ai::{OllamaEmbedder, OllamaStructurer};
