//! Fact extractor - structuring calls plus strict schema validation.
//!
//! The extractor treats model output as untrusted input: every payload is
//! validated against the closed record schema, and a violation buys exactly
//! one repair round naming the broken constraint before the record is given
//! up as `Schema` (the pipeline then marks it pending, never drops it).

pub mod prompts;

use tracing::{debug, warn};

use crate::error::{RefineryError, Result, SchemaViolation};
use crate::temporal::{self, Resolution};
use crate::traits::structurer::{StructureRequest, StructuredPayload, Structurer};
use crate::types::config::ExtractorConfig;
use crate::types::record::{Category, RawRecord, StructuredRecord};

pub use prompts::{repair_instruction, structure_instruction};

/// Turns raw records into validated structured records.
pub struct FactExtractor<S: Structurer> {
    structurer: S,
    config: ExtractorConfig,
}

impl<S: Structurer> FactExtractor<S> {
    /// Create an extractor with the default configuration.
    pub fn new(structurer: S) -> Self {
        Self::with_config(structurer, ExtractorConfig::default())
    }

    /// Create an extractor with an explicit configuration.
    pub fn with_config(structurer: S, config: ExtractorConfig) -> Self {
        Self { structurer, config }
    }

    /// Extract a validated structured record from a raw record.
    ///
    /// Idempotent with respect to the raw record: the instruction depends
    /// only on `(text, posted_at)`, and the latest successful extraction for
    /// an id fully replaces any prior one at the store.
    ///
    /// # Errors
    ///
    /// - `Schema` when validation still fails after the repair budget.
    /// - `Unavailable` when the structuring interface is unreachable or the
    ///   call times out; backoff and retry scheduling belong to the caller.
    pub async fn extract(&self, raw: &RawRecord) -> Result<StructuredRecord> {
        let mut request = StructureRequest {
            instruction: structure_instruction(raw),
            raw_text: raw.text.clone(),
            anchor: raw.posted_at,
        };

        let mut violation: Option<SchemaViolation> = None;
        for attempt in 0..=self.config.repair_attempts {
            if let Some(v) = &violation {
                warn!(record = %raw.id, attempt, violation = %v, "repairing extraction");
                request.instruction = repair_instruction(raw, v);
            }

            let outcome = match self.call(&request).await {
                Ok(payload) => validate_payload(payload, raw),
                // A malformed response body is a validation failure and
                // eligible for repair; transport failures are not.
                Err(RefineryError::Schema(v)) => Err(v),
                Err(other) => return Err(other),
            };

            match outcome {
                Ok(record) => {
                    debug!(record = %raw.id, attempt, "extraction validated");
                    return Ok(record);
                }
                Err(v) => violation = Some(v),
            }
        }

        Err(violation
            .expect("loop ran at least once")
            .into())
    }

    /// One timeout-bounded structuring call.
    async fn call(&self, request: &StructureRequest) -> Result<StructuredPayload> {
        match tokio::time::timeout(self.config.timeout, self.structurer.structure(request)).await {
            Ok(result) => result,
            Err(elapsed) => Err(RefineryError::unavailable(elapsed)),
        }
    }
}

/// Validate a candidate payload against the record schema.
///
/// Residual relative date phrases are resolved through the temporal
/// resolver, anchored to the record's publication time. A non-null but
/// uninterpretable date is a violation - never a fabricated date.
pub fn validate_payload(
    payload: StructuredPayload,
    raw: &RawRecord,
) -> std::result::Result<StructuredRecord, SchemaViolation> {
    let category: Category = payload.category.parse()?;

    let importance = u8::try_from(payload.importance)
        .ok()
        .filter(|i| StructuredRecord::IMPORTANCE_RANGE.contains(i))
        .ok_or_else(|| {
            SchemaViolation::new(
                "importance",
                format!("{} is outside the 1..=5 range", payload.importance),
            )
        })?;

    let due_date = match &payload.real_date {
        None => None,
        Some(expression) => match temporal::resolve(expression, raw.posted_at) {
            Resolution::Date(date) => Some(date),
            Resolution::Unresolved => {
                return Err(SchemaViolation::new(
                    "real_date",
                    format!("`{expression}` is not an interpretable date expression"),
                ));
            }
        },
    };

    let record = StructuredRecord {
        id: raw.id.clone(),
        course_id: raw.course_id.clone(),
        category,
        due_date,
        past_due_correction: payload.past_due_correction,
        importance,
        summary: payload.summary,
        posted_at: raw.posted_at,
        source_url: raw.source_url.clone(),
        raw_text: raw.text.clone(),
    };
    record.validate()?;
    Ok(record)
}
