//! Core trait abstractions.

pub mod embedder;
pub mod index;
pub mod store;
pub mod structurer;

pub use embedder::Embedder;
pub use index::SearchIndex;
pub use store::KnowledgeStore;
pub use structurer::{StructureRequest, StructuredPayload, Structurer};
