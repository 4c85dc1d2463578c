//! Domain data types.

pub mod candidate;
pub mod config;
pub mod record;

pub use candidate::{ContextCandidate, RetrievedContext, ScoredId};
pub use config::{ExtractorConfig, FusionConfig, PipelineConfig};
pub use record::{Category, RawRecord, StructuredRecord};
