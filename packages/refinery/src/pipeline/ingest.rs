//! Ingestion pipeline - extract, store, and index raw record batches.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::RefineryError;
use crate::extractor::FactExtractor;
use crate::traits::{index::SearchIndex, store::KnowledgeStore, structurer::Structurer};
use crate::types::config::PipelineConfig;
use crate::types::record::RawRecord;

/// Terminal state of a record after one pipeline run.
///
/// Per record the machine is `new -> extracting -> {stored | pending |
/// failed}`; `inconsistent` is the post-store divergence where the upsert
/// succeeded but an index update did not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Extraction validated; store and both indexes updated
    Stored,

    /// Schema violation survived the repair attempt; re-attempted on a
    /// later run, never silently dropped
    Pending,

    /// Transport retry budget exhausted (or the run was cancelled);
    /// re-queued on the next ingestion cycle
    Failed,

    /// Stored but at least one index update failed; queued for a repair
    /// pass - the store write is never rolled back
    Inconsistent,
}

/// Outcome for a single record in a batch.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub id: String,
    pub state: RecordState,

    /// Violation or failure detail, when there is one
    pub detail: Option<String>,
}

/// Result of an ingest run.
///
/// Every record in the batch appears exactly once; `pending`, `failed`, and
/// `inconsistent` ids are enumerable and re-processable.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl IngestReport {
    /// Ids currently in the given state.
    pub fn ids_in(&self, state: RecordState) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.state == state)
            .map(|o| o.id.as_str())
            .collect()
    }

    /// Number of fully stored-and-indexed records.
    pub fn stored_count(&self) -> usize {
        self.ids_in(RecordState::Stored).len()
    }

    /// Ids to feed back into the next scheduled run.
    pub fn requeue_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, RecordState::Pending | RecordState::Failed))
            .map(|o| o.id.as_str())
            .collect()
    }

    /// Ids queued for an index repair pass.
    pub fn inconsistent_ids(&self) -> Vec<&str> {
        self.ids_in(RecordState::Inconsistent)
    }

    /// Check whether every record landed in `Stored`.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.state == RecordState::Stored)
    }
}

/// Ingest a batch: extract -> upsert -> index, per record.
///
/// Records are processed with bounded concurrency; one record's failure
/// never blocks its siblings, and one stuck extraction never serializes the
/// batch.
pub async fn ingest_batch<S, K, Sem, Lex>(
    raws: &[RawRecord],
    config: &PipelineConfig,
    extractor: &FactExtractor<S>,
    store: &K,
    semantic: &Sem,
    lexical: &Lex,
) -> IngestReport
where
    S: Structurer,
    K: KnowledgeStore,
    Sem: SearchIndex,
    Lex: SearchIndex,
{
    ingest_batch_cancellable(
        raws,
        config,
        extractor,
        store,
        semantic,
        lexical,
        &CancellationToken::new(),
    )
    .await
}

/// `ingest_batch` with external cancellation.
///
/// Cancellation stops scheduling new records and aborts in-flight
/// extraction calls; already-completed records keep their outcomes.
pub async fn ingest_batch_cancellable<S, K, Sem, Lex>(
    raws: &[RawRecord],
    config: &PipelineConfig,
    extractor: &FactExtractor<S>,
    store: &K,
    semantic: &Sem,
    lexical: &Lex,
    cancel: &CancellationToken,
) -> IngestReport
where
    S: Structurer,
    K: KnowledgeStore,
    Sem: SearchIndex,
    Lex: SearchIndex,
{
    info!(records = raws.len(), "ingesting batch");

    let outcomes: Vec<RecordOutcome> = stream::iter(raws)
        .map(|raw| async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => RecordOutcome {
                    id: raw.id.clone(),
                    state: RecordState::Failed,
                    detail: Some("cancelled".to_string()),
                },
                outcome = process_record(raw, config, extractor, store, semantic, lexical) => outcome,
            }
        })
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let report = IngestReport { outcomes };
    info!(
        stored = report.stored_count(),
        pending = report.ids_in(RecordState::Pending).len(),
        failed = report.ids_in(RecordState::Failed).len(),
        inconsistent = report.inconsistent_ids().len(),
        "batch complete"
    );
    report
}

/// Drive one record through `extracting -> {stored | pending | failed}`.
async fn process_record<S, K, Sem, Lex>(
    raw: &RawRecord,
    config: &PipelineConfig,
    extractor: &FactExtractor<S>,
    store: &K,
    semantic: &Sem,
    lexical: &Lex,
) -> RecordOutcome
where
    S: Structurer,
    K: KnowledgeStore,
    Sem: SearchIndex,
    Lex: SearchIndex,
{
    let outcome = |state, detail: Option<String>| RecordOutcome {
        id: raw.id.clone(),
        state,
        detail,
    };

    // Extraction, with bounded backoff retries on transport failure.
    let mut record = None;
    for attempt in 1..=config.max_attempts {
        match extractor.extract(raw).await {
            Ok(r) => {
                record = Some(r);
                break;
            }
            Err(RefineryError::Schema(violation)) => {
                return outcome(RecordState::Pending, Some(violation.to_string()));
            }
            Err(err) if err.is_retryable() => {
                if attempt == config.max_attempts {
                    warn!(record = %raw.id, attempts = attempt, "extraction retry budget exhausted");
                    return outcome(RecordState::Failed, Some(err.to_string()));
                }
                let backoff = config.backoff_for(attempt);
                warn!(record = %raw.id, attempt, ?backoff, "structuring unavailable, backing off");
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return outcome(RecordState::Failed, Some(err.to_string())),
        }
    }
    let record = match record {
        Some(r) => r,
        // max_attempts >= 1, so the loop either set the record or returned.
        None => return outcome(RecordState::Failed, Some("no extraction attempt ran".into())),
    };

    // Store upsert: the source of truth. A boundary rejection here means
    // the record is as un-storable as a schema violation.
    if let Err(err) = store.upsert(&record).await {
        return match err {
            RefineryError::Schema(v) => outcome(RecordState::Pending, Some(v.to_string())),
            other => outcome(RecordState::Failed, Some(other.to_string())),
        };
    }

    // Index updates. The store write is never rolled back for an index
    // failure; the record is queued for a repair pass instead.
    let text = record.index_text();
    let semantic_result = semantic.index(&raw.id, &text).await;
    let lexical_result = lexical.index(&raw.id, &text).await;
    if let Err(err) = semantic_result.and(lexical_result) {
        warn!(record = %raw.id, error = %err, "index update failed after store upsert");
        return outcome(RecordState::Inconsistent, Some(err.to_string()));
    }

    outcome(RecordState::Stored, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{LexicalIndex, SemanticIndex};
    use crate::stores::MemoryStore;
    use crate::testing::{MockEmbedder, MockStructurer};
    use crate::traits::structurer::StructuredPayload;
    use crate::types::config::ExtractorConfig;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn raw(text: &str) -> RawRecord {
        RawRecord::new(
            text,
            format!("https://lms.example.edu/{}", text.len()),
            "cs101",
            Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap(),
        )
    }

    fn payload(category: &str, importance: i64) -> StructuredPayload {
        StructuredPayload {
            category: category.to_string(),
            real_date: Some("다음 주 금요일".to_string()),
            importance,
            summary: "과제 제출 안내".to_string(),
            past_due_correction: false,
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig::default().with_initial_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_batch_stores_and_indexes() {
        let records = vec![raw("3주차 과제 제출"), raw("중간고사 안내")];
        let structurer = MockStructurer::new();
        let extractor = FactExtractor::new(structurer);
        let store = MemoryStore::new();
        let semantic = SemanticIndex::new(MockEmbedder::new());
        let lexical = LexicalIndex::new();

        let report = ingest_batch(
            &records,
            &fast_config(),
            &extractor,
            &store,
            &semantic,
            &lexical,
        )
        .await;

        assert!(report.is_success());
        assert_eq!(report.stored_count(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
        for r in &records {
            assert!(semantic.contains(&r.id).await.unwrap());
            assert!(lexical.contains(&r.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_schema_violation_goes_pending_without_blocking_siblings() {
        let bad = raw("깨진 레코드");
        let good = raw("정상 공지");
        let structurer = MockStructurer::new()
            // Invalid on the first try and on the repair retry.
            .with_payloads(&bad.text, vec![payload("exam", 9), payload("exam", 0)]);
        let extractor = FactExtractor::new(structurer);
        let store = MemoryStore::new();
        let semantic = SemanticIndex::new(MockEmbedder::new());
        let lexical = LexicalIndex::new();

        let report = ingest_batch(
            &[bad.clone(), good.clone()],
            &fast_config(),
            &extractor,
            &store,
            &semantic,
            &lexical,
        )
        .await;

        assert_eq!(report.stored_count(), 1);
        assert_eq!(report.ids_in(RecordState::Pending), vec![bad.id.as_str()]);
        assert_eq!(report.requeue_ids(), vec![bad.id.as_str()]);
        assert!(store.get(&bad.id).await.unwrap().is_none());
        assert!(store.get(&good.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transport_outage_retries_then_fails() {
        let record = raw("연결 안되는 레코드");
        let structurer = MockStructurer::new().fail_transport(&record.text);
        let extractor = FactExtractor::new(structurer.clone());
        let store = MemoryStore::new();
        let semantic = SemanticIndex::new(MockEmbedder::new());
        let lexical = LexicalIndex::new();

        let config = fast_config().with_max_attempts(3);
        let report = ingest_batch(
            std::slice::from_ref(&record),
            &config,
            &extractor,
            &store,
            &semantic,
            &lexical,
        )
        .await;

        assert_eq!(report.ids_in(RecordState::Failed), vec![record.id.as_str()]);
        assert_eq!(structurer.call_count(), 3);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_transient_outage_recovers_within_budget() {
        let record = raw("한 번 실패 후 성공");
        let structurer = MockStructurer::new().fail_transport_times(&record.text, 1);
        let extractor = FactExtractor::new(structurer);
        let store = MemoryStore::new();
        let semantic = SemanticIndex::new(MockEmbedder::new());
        let lexical = LexicalIndex::new();

        let report = ingest_batch(
            std::slice::from_ref(&record),
            &fast_config(),
            &extractor,
            &store,
            &semantic,
            &lexical,
        )
        .await;

        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_index_failure_after_upsert_is_inconsistent() {
        let record = raw("색인 실패 레코드");
        let structurer = MockStructurer::new()
            .with_payload(&record.text, payload("assignment", 3));
        let extractor = FactExtractor::new(structurer);
        let store = MemoryStore::new();

        // The embedder fails on this record's derived index text, so the
        // semantic index update fails after the upsert succeeded.
        let stored_payload = payload("assignment", 3);
        let index_text = format!("{}\n{}", stored_payload.summary, record.text);
        let semantic = SemanticIndex::new(MockEmbedder::new().fail_text(index_text));
        let lexical = LexicalIndex::new();

        let report = ingest_batch(
            std::slice::from_ref(&record),
            &fast_config(),
            &extractor,
            &store,
            &semantic,
            &lexical,
        )
        .await;

        assert_eq!(report.inconsistent_ids(), vec![record.id.as_str()]);
        // The store keeps the record: it is the source of truth.
        assert!(store.get(&record.id).await.unwrap().is_some());
        assert!(!semantic.contains(&record.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reextraction_is_idempotent_at_the_store() {
        let record = raw("재추출 레코드");
        let structurer = MockStructurer::new().with_payloads(
            &record.text,
            vec![payload("assignment", 2), payload("assignment", 5)],
        );
        let extractor = FactExtractor::new(structurer);
        let store = MemoryStore::new();
        let semantic = SemanticIndex::new(MockEmbedder::new());
        let lexical = LexicalIndex::new();

        for _ in 0..2 {
            ingest_batch(
                std::slice::from_ref(&record),
                &fast_config(),
                &extractor,
                &store,
                &semantic,
                &lexical,
            )
            .await;
        }

        // Exactly one record per id, reflecting the latest extraction.
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get(&record.id).await.unwrap().unwrap().importance, 5);
        assert_eq!(semantic.len(), 1);
        assert_eq!(lexical.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_fails_remaining_records() {
        let record = raw("취소될 레코드");
        let structurer = MockStructurer::new();
        let extractor = FactExtractor::with_config(
            structurer,
            ExtractorConfig::default().with_timeout(Duration::from_secs(5)),
        );
        let store = MemoryStore::new();
        let semantic = SemanticIndex::new(MockEmbedder::new());
        let lexical = LexicalIndex::new();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = ingest_batch_cancellable(
            std::slice::from_ref(&record),
            &fast_config(),
            &extractor,
            &store,
            &semantic,
            &lexical,
            &cancel,
        )
        .await;

        assert_eq!(report.ids_in(RecordState::Failed), vec![record.id.as_str()]);
        assert_eq!(report.outcomes[0].detail.as_deref(), Some("cancelled"));
    }
}
