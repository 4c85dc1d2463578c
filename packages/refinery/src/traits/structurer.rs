//! Structuring interface - the narrow seam to the external language model.
//!
//! The extractor builds a deterministic instruction, hands it to a
//! `Structurer`, and validates whatever comes back. Model output is
//! untrusted input: a payload that parses but violates the record schema is
//! a `SchemaViolation`, and a response that does not parse as the fixed
//! payload shape is also a validation failure, never a transport failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Request handed to the structuring interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureRequest {
    /// Deterministic instruction text (schema, rules, anchor date)
    pub instruction: String,

    /// The raw record text to structure
    pub raw_text: String,

    /// The record's publication time - the only valid temporal anchor
    pub anchor: DateTime<Utc>,
}

/// Fixed-shape candidate payload returned by the structuring interface.
///
/// Untrusted until validated against the `StructuredRecord` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredPayload {
    /// Claimed category (validated against the closed set)
    pub category: String,

    /// Due or event date: absolute (`YYYY-MM-DD`) or a residual relative
    /// phrase the temporal resolver can interpret; null when the text has
    /// no interpretable date
    pub real_date: Option<String>,

    /// Claimed importance (validated against 1..=5)
    pub importance: i64,

    /// Action-oriented summary
    pub summary: String,

    /// Set when the date intentionally precedes the publication time
    /// (a correction for an already-passed deadline)
    #[serde(default)]
    pub past_due_correction: bool,
}

/// External structuring interface.
///
/// Implementations wrap a specific model transport (Ollama, OpenAI, ...).
/// Transport failures map to `RefineryError::Unavailable`; malformed
/// response bodies map to `RefineryError::Schema`.
#[async_trait]
pub trait Structurer: Send + Sync {
    /// Turn raw text into a candidate structured payload.
    async fn structure(&self, request: &StructureRequest) -> Result<StructuredPayload>;
}

#[async_trait]
impl<T: Structurer + ?Sized> Structurer for &T {
    async fn structure(&self, request: &StructureRequest) -> Result<StructuredPayload> {
        (**self).structure(request).await
    }
}

#[async_trait]
impl<T: Structurer + ?Sized> Structurer for std::sync::Arc<T> {
    async fn structure(&self, request: &StructureRequest) -> Result<StructuredPayload> {
        (**self).structure(request).await
    }
}
