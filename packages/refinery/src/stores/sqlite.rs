//! SQLite knowledge store.
//!
//! A file-based backend using SQLite. Good for:
//! - Local development
//! - Single-operator deployments
//! - Testing with persistent data

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use crate::error::{RefineryError, Result};
use crate::traits::store::KnowledgeStore;
use crate::types::record::{Category, StructuredRecord};

/// SQLite-backed structured-record store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://./refinery.db?mode=rwc` - Create file if not exists
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| RefineryError::Storage(e.to_string().into()))?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                course_id TEXT NOT NULL,
                category TEXT NOT NULL,
                due_date TEXT,
                past_due_correction INTEGER NOT NULL DEFAULT 0,
                importance INTEGER NOT NULL,
                summary TEXT NOT NULL,
                posted_at TEXT NOT NULL,
                source_url TEXT NOT NULL,
                raw_text TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_course_id ON records(course_id);
            CREATE INDEX IF NOT EXISTS idx_records_due_date ON records(due_date);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RefineryError::Storage(e.to_string().into()))?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

// Row type for sqlx queries
#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    course_id: String,
    category: String,
    due_date: Option<String>,
    past_due_correction: bool,
    importance: i64,
    summary: String,
    posted_at: String,
    source_url: String,
    raw_text: String,
}

impl RecordRow {
    fn into_record(self) -> Result<StructuredRecord> {
        let category: Category = self
            .category
            .parse()
            .map_err(|e: crate::error::SchemaViolation| RefineryError::Storage(e.to_string().into()))?;

        let posted_at = chrono::DateTime::parse_from_rfc3339(&self.posted_at)
            .map_err(|e| RefineryError::Storage(format!("Invalid date: {}", e).into()))?
            .with_timezone(&chrono::Utc);

        let due_date = self
            .due_date
            .map(|d| {
                d.parse::<chrono::NaiveDate>()
                    .map_err(|e| RefineryError::Storage(format!("Invalid date: {}", e).into()))
            })
            .transpose()?;

        Ok(StructuredRecord {
            id: self.id,
            course_id: self.course_id,
            category,
            due_date,
            past_due_correction: self.past_due_correction,
            importance: self.importance as u8,
            summary: self.summary,
            posted_at,
            source_url: self.source_url,
            raw_text: self.raw_text,
        })
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn upsert(&self, record: &StructuredRecord) -> Result<()> {
        // Last line of defense, independent of the extractor's validation.
        record.validate()?;

        // Single statement: atomic per id, same-id writes serialize in
        // SQLite's write path.
        sqlx::query(
            r#"
            INSERT INTO records (id, course_id, category, due_date, past_due_correction, importance, summary, posted_at, source_url, raw_text)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                course_id = excluded.course_id,
                category = excluded.category,
                due_date = excluded.due_date,
                past_due_correction = excluded.past_due_correction,
                importance = excluded.importance,
                summary = excluded.summary,
                posted_at = excluded.posted_at,
                source_url = excluded.source_url,
                raw_text = excluded.raw_text
            "#,
        )
        .bind(&record.id)
        .bind(&record.course_id)
        .bind(record.category.as_str())
        .bind(record.due_date.map(|d| d.to_string()))
        .bind(record.past_due_correction)
        .bind(record.importance as i64)
        .bind(&record.summary)
        .bind(record.posted_at.to_rfc3339())
        .bind(&record.source_url)
        .bind(&record.raw_text)
        .execute(&self.pool)
        .await
        .map_err(|e| RefineryError::Storage(e.to_string().into()))?;

        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<StructuredRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            "SELECT id, course_id, category, due_date, past_due_correction, importance, summary, posted_at, source_url, raw_text FROM records WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RefineryError::Storage(e.to_string().into()))?;

        match row {
            Some(r) => Ok(Some(r.into_record()?)),
            None => Ok(None),
        }
    }

    async fn all(&self) -> Result<Vec<StructuredRecord>> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT id, course_id, category, due_date, past_due_correction, importance, summary, posted_at, source_url, raw_text FROM records",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RefineryError::Storage(e.to_string().into()))?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }

    async fn remove(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RefineryError::Storage(e.to_string().into()))?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RefineryError::Storage(e.to_string().into()))?;
        Ok(count.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn record(id: &str, importance: u8) -> StructuredRecord {
        StructuredRecord {
            id: id.to_string(),
            course_id: "cs101".to_string(),
            category: Category::Exam,
            due_date: Some(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()),
            past_due_correction: false,
            importance,
            summary: "기말고사 안내".to_string(),
            posted_at: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            source_url: "https://lms.example.edu/e/1".to_string(),
            raw_text: "기말고사는 6월 20일".to_string(),
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert(&record("r1", 5)).await.unwrap();

        let fetched = store.get("r1").await.unwrap().unwrap();
        assert_eq!(fetched.category, Category::Exam);
        assert_eq!(fetched.due_date, Some(NaiveDate::from_ymd_opt(2025, 6, 20).unwrap()));
        assert_eq!(fetched.importance, 5);
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert(&record("r1", 2)).await.unwrap();
        store.upsert(&record("r1", 4)).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get("r1").await.unwrap().unwrap().importance, 4);
    }

    #[tokio::test]
    async fn test_boundary_validation() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.upsert(&record("r1", 0)).await.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert(&record("r1", 3)).await.unwrap();
        store.remove("r1").await.unwrap();
        assert!(store.get("r1").await.unwrap().is_none());
    }
}
