//! Typed errors for the refinery library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// A structured payload that failed schema validation.
///
/// Carries the violated field and the reason, so a repair instruction can
/// name the exact constraint that was broken.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("field `{field}`: {reason}")]
pub struct SchemaViolation {
    /// The payload field that violated the schema
    pub field: &'static str,

    /// Human-readable description of the violated constraint
    pub reason: String,
}

impl SchemaViolation {
    /// Create a new schema violation.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during refinement and retrieval operations.
#[derive(Debug, Error)]
pub enum RefineryError {
    /// Structuring payload violated the record schema (after repair)
    #[error("schema violation: {0}")]
    Schema(#[from] SchemaViolation),

    /// Structuring interface unreachable or timed out
    #[error("structuring service unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Store and index diverged for a record id
    #[error("index out of sync with store for record: {id}")]
    InconsistentIndex { id: String },

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl RefineryError {
    /// Wrap a transport-layer error as `Unavailable`.
    pub fn unavailable(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Box::new(source))
    }

    /// Wrap a storage-layer error.
    pub fn storage(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(source))
    }

    /// True for errors that a backoff retry can recover from.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Result type alias for refinery operations.
pub type Result<T> = std::result::Result<T, RefineryError>;
