//! Record types - raw crawler output and validated structured facts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::SchemaViolation;

/// An unstructured record as produced by the crawler.
///
/// Immutable once produced. Identity is a content hash of
/// `(source_url, text)` so that re-crawls of unchanged content map to the
/// same record id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Stable content-hash identity
    pub id: String,

    /// The raw text (announcement body, assignment description, ...)
    pub text: String,

    /// Where the crawler found this record
    pub source_url: String,

    /// Course this record belongs to
    pub course_id: String,

    /// When the record was published (the temporal anchor)
    pub posted_at: DateTime<Utc>,

    /// When the crawler fetched it
    pub fetched_at: DateTime<Utc>,
}

impl RawRecord {
    /// Create a raw record, deriving its id from `(source_url, text)`.
    pub fn new(
        text: impl Into<String>,
        source_url: impl Into<String>,
        course_id: impl Into<String>,
        posted_at: DateTime<Utc>,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let text = text.into();
        let source_url = source_url.into();
        Self {
            id: Self::hash_identity(&source_url, &text),
            text,
            source_url,
            course_id: course_id.into(),
            posted_at,
            fetched_at,
        }
    }

    /// Content-hash identity over `(source_url, text)`.
    pub fn hash_identity(source_url: &str, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_url.as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Closed category set for structured records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Assignment,
    Exam,
    Notice,
    Material,
}

impl Category {
    /// All valid category names, for repair instructions.
    pub const NAMES: [&'static str; 4] = ["assignment", "exam", "notice", "material"];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assignment => "assignment",
            Self::Exam => "exam",
            Self::Notice => "notice",
            Self::Material => "material",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = SchemaViolation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "assignment" => Ok(Self::Assignment),
            "exam" => Ok(Self::Exam),
            "notice" => Ok(Self::Notice),
            "material" => Ok(Self::Material),
            other => Err(SchemaViolation::new(
                "category",
                format!(
                    "`{other}` is not one of: {}",
                    Self::NAMES.join(", ")
                ),
            )),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A schema-validated structured record.
///
/// Created by the fact extractor, immutable after validation. Re-extraction
/// supersedes the prior record for the same id via store upsert, never by
/// partial mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredRecord {
    /// Same id as the raw record it was extracted from
    pub id: String,

    /// Course this record belongs to
    pub course_id: String,

    /// Closed category
    pub category: Category,

    /// Resolved due/event date, absent when no interpretable date exists
    pub due_date: Option<NaiveDate>,

    /// True when `due_date` intentionally precedes `posted_at`
    /// (e.g. a correction posted after the deadline passed)
    #[serde(default)]
    pub past_due_correction: bool,

    /// Importance on a 1 (trivial) to 5 (critical) scale
    pub importance: u8,

    /// Action-oriented summary of the record
    pub summary: String,

    /// Publication time carried over from the raw record
    pub posted_at: DateTime<Utc>,

    /// Reference back to the raw source
    pub source_url: String,

    /// Raw text carried over from the raw record.
    ///
    /// Kept on the stored record so both index entries derive from the
    /// store alone and remain rebuildable after a crash.
    pub raw_text: String,
}

impl StructuredRecord {
    /// Valid importance range, inclusive.
    pub const IMPORTANCE_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

    /// Check the cross-field invariants.
    ///
    /// Enforced by the extractor after structuring and again at the store
    /// boundary. A record failing these is rejected, never stored.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if !Self::IMPORTANCE_RANGE.contains(&self.importance) {
            return Err(SchemaViolation::new(
                "importance",
                format!("{} is outside the 1..=5 range", self.importance),
            ));
        }
        if self.summary.trim().is_empty() {
            return Err(SchemaViolation::new("summary", "must not be empty"));
        }
        if let Some(due) = self.due_date {
            if due < self.posted_at.date_naive() && !self.past_due_correction {
                return Err(SchemaViolation::new(
                    "due_date",
                    format!(
                        "{due} is earlier than posted_at {} without a past-due correction flag",
                        self.posted_at.date_naive()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Text both indexes derive their entries from: summary plus raw text.
    pub fn index_text(&self) -> String {
        format!("{}\n{}", self.summary, self.raw_text)
    }
}
