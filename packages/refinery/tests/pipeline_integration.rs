//! Integration tests for the full refinement loop.
//!
//! These tests verify the complete workflow:
//! 1. Ingest raw records (extract -> validate -> store -> index)
//! 2. Query through hybrid retrieval
//! 3. Supersede records via re-extraction
//! 4. Detect and repair store/index divergence

use chrono::{NaiveDate, TimeZone, Utc};

use refinery::testing::{MockEmbedder, MockStructurer};
use refinery::{
    find_unindexed, ingest_batch, repair_pass, FactExtractor, HybridRetriever, KnowledgeStore,
    LexicalIndex, MemoryStore, PipelineConfig, RawRecord, RecordState, SemanticIndex,
    StructuredPayload,
};

fn raw(text: &str, course: &str, day: u32) -> RawRecord {
    RawRecord::new(
        text,
        format!("https://lms.example.edu/{course}/{day}"),
        course,
        Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 3, day, 10, 0, 0).unwrap(),
    )
}

fn payload(category: &str, real_date: Option<&str>, importance: i64, summary: &str) -> StructuredPayload {
    StructuredPayload {
        category: category.to_string(),
        real_date: real_date.map(String::from),
        importance,
        summary: summary.to_string(),
        past_due_correction: false,
    }
}

fn fast_config() -> PipelineConfig {
    PipelineConfig::default().with_initial_backoff(std::time::Duration::from_millis(1))
}

#[tokio::test]
async fn test_ingest_then_query_round_trip() {
    let assignment = raw("3주차 과제: 다음 주 금요일까지 제출", "cs101", 3);
    let exam = raw("중간고사는 4월 21일입니다", "cs101", 5);

    let structurer = MockStructurer::new()
        .with_payload(
            &assignment.text,
            payload("assignment", Some("다음 주 금요일"), 4, "3주차 과제 제출"),
        )
        .with_payload(
            &exam.text,
            payload("exam", Some("4월 21일"), 5, "중간고사 일정"),
        );

    let extractor = FactExtractor::new(structurer);
    let store = MemoryStore::new();
    // Pin the embedding space: the query sits next to the assignment and
    // orthogonal to the exam.
    let embedder = MockEmbedder::new()
        .with_embedding("3주차 과제", vec![1.0, 0.0])
        .with_embedding(
            format!("3주차 과제 제출\n{}", assignment.text),
            vec![0.9, 0.1],
        )
        .with_embedding(format!("중간고사 일정\n{}", exam.text), vec![0.0, 1.0]);
    let semantic = SemanticIndex::new(embedder);
    let lexical = LexicalIndex::new();

    let report = ingest_batch(
        &[assignment.clone(), exam.clone()],
        &fast_config(),
        &extractor,
        &store,
        &semantic,
        &lexical,
    )
    .await;
    assert!(report.is_success());

    // The relative phrase resolved against posted_at (2025-03-03, a
    // Monday): next week's Friday.
    let stored = store.get(&assignment.id).await.unwrap().unwrap();
    assert_eq!(stored.due_date, Some(NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()));

    // Lexical tokens carry the "3주차" query to the right record.
    let retriever = HybridRetriever::new(&semantic, &lexical, &store);
    let context = retriever.retrieve_with_records("3주차 과제", 5).await.unwrap();
    assert!(!context.is_empty());
    assert_eq!(context[0].record.id, assignment.id);
    assert_eq!(context[0].candidate.rank, 1);
}

#[tokio::test]
async fn test_reextraction_supersedes_and_search_follows() {
    let record = raw("과제 공지", "cs101", 3);

    // First extraction calls it a low-importance notice; the re-crawl
    // extraction corrects it to an assignment with a due date.
    let structurer = MockStructurer::new().with_payloads(
        &record.text,
        vec![
            payload("notice", None, 2, "공지사항"),
            payload("assignment", Some("2025-03-21"), 4, "보고서 제출"),
        ],
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

    // One record for the id, reflecting the latest extraction.
    assert_eq!(store.count().await.unwrap(), 1);
    let stored = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(stored.summary, "보고서 제출");

    // The old index entry was replaced, not duplicated: the superseded
    // summary no longer matches, the new one does, exactly once.
    let retriever = HybridRetriever::new(&semantic, &lexical, &store);
    let old = retriever.retrieve("공지사항", 10).await.unwrap();
    assert!(old.iter().all(|c| c.record_id != record.id || c.lexical_score == 0.0));

    let new = retriever.retrieve("보고서", 10).await.unwrap();
    let hits: Vec<_> = new.iter().filter(|c| c.record_id == record.id).collect();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn test_inconsistency_detected_and_repaired() {
    let record = raw("색인이 깨질 레코드", "cs101", 3);
    let structurer = MockStructurer::new().with_payload(
        &record.text,
        payload("material", None, 2, "강의자료"),
    );
    let extractor = FactExtractor::new(structurer);
    let store = MemoryStore::new();

    // Semantic indexing fails on this record's derived text.
    let index_text = format!("강의자료\n{}", record.text);
    let failing_embedder = MockEmbedder::new().fail_text(index_text);
    let semantic = SemanticIndex::new(failing_embedder);
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

    // The divergence is detectable from the store alone.
    let healthy_semantic = SemanticIndex::new(MockEmbedder::new());
    let missing = find_unindexed(&store, &healthy_semantic, &lexical).await.unwrap();
    assert_eq!(missing, vec![record.id.clone()]);

    // A repair pass re-indexes without altering the stored fields.
    let before = store.get(&record.id).await.unwrap().unwrap();
    repair_pass(&store, &healthy_semantic, &lexical, &missing).await.unwrap();
    let after = store.get(&record.id).await.unwrap().unwrap();
    assert_eq!(before.summary, after.summary);
    assert!(find_unindexed(&store, &healthy_semantic, &lexical)
        .await
        .unwrap()
        .is_empty());

    // And the record is now retrievable.
    let retriever = HybridRetriever::new(&healthy_semantic, &lexical, &store);
    let context = retriever.retrieve("강의자료", 5).await.unwrap();
    assert_eq!(context.len(), 1);
    assert_eq!(context[0].record_id, record.id);
}

#[tokio::test]
async fn test_mixed_batch_isolates_failures() {
    let good = raw("정상 공지", "cs101", 3);
    let schema_broken = raw("스키마 위반", "cs101", 4);
    let unreachable = raw("전송 실패", "cs101", 5);

    let structurer = MockStructurer::new()
        .with_payloads(
            &schema_broken.text,
            vec![
                payload("unknown-category", None, 3, "?"),
                payload("unknown-category", None, 3, "?"),
            ],
        )
        .fail_transport(&unreachable.text);
    let extractor = FactExtractor::new(structurer);
    let store = MemoryStore::new();
    let semantic = SemanticIndex::new(MockEmbedder::new());
    let lexical = LexicalIndex::new();

    let config = fast_config().with_max_attempts(2);
    let report = ingest_batch(
        &[good.clone(), schema_broken.clone(), unreachable.clone()],
        &config,
        &extractor,
        &store,
        &semantic,
        &lexical,
    )
    .await;

    assert_eq!(report.stored_count(), 1);
    assert_eq!(report.ids_in(RecordState::Pending), vec![schema_broken.id.as_str()]);
    assert_eq!(report.ids_in(RecordState::Failed), vec![unreachable.id.as_str()]);

    // Failed and pending records are re-processable, not lost.
    let mut requeue = report.requeue_ids();
    requeue.sort();
    let mut expected = vec![schema_broken.id.as_str(), unreachable.id.as_str()];
    expected.sort();
    assert_eq!(requeue, expected);

    // The sibling record made it through untouched.
    assert!(store.get(&good.id).await.unwrap().is_some());
}
