//! Lexical index - inverted postings with BM25 scoring.
//!
//! Catches exact token matches (numbers, proper nouns, week labels like
//! "3주차") that embeddings can blur.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::index::SearchIndex;
use crate::types::candidate::ScoredId;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// Split into lowercase alphanumeric runs.
///
/// `char::is_alphanumeric` covers Hangul and CJK, so mixed tokens like
/// "3주차" stay whole instead of being split at the digit boundary.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Default)]
struct Postings {
    /// term -> (record id -> term frequency)
    terms: HashMap<String, HashMap<String, u32>>,

    /// record id -> document length in tokens
    doc_len: HashMap<String, u32>,
}

impl Postings {
    fn remove_doc(&mut self, id: &str) {
        if self.doc_len.remove(id).is_none() {
            return;
        }
        for map in self.terms.values_mut() {
            map.remove(id);
        }
        self.terms.retain(|_, map| !map.is_empty());
    }

    fn insert_doc(&mut self, id: &str, tokens: &[String]) {
        self.doc_len.insert(id.to_string(), tokens.len() as u32);
        for token in tokens {
            *self
                .terms
                .entry(token.clone())
                .or_default()
                .entry(id.to_string())
                .or_insert(0) += 1;
        }
    }

    fn avg_doc_len(&self) -> f32 {
        if self.doc_len.is_empty() {
            return 0.0;
        }
        self.doc_len.values().map(|&l| l as f32).sum::<f32>() / self.doc_len.len() as f32
    }
}

/// In-memory inverted index with BM25 (Okapi) scoring.
///
/// `index`/`remove` take the write lock, so searches observe either the old
/// or the new entry for an id, never a torn one.
#[derive(Default)]
pub struct LexicalIndex {
    postings: RwLock<Postings>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.postings.read().unwrap().doc_len.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SearchIndex for LexicalIndex {
    async fn index(&self, id: &str, text: &str) -> Result<()> {
        let tokens = tokenize(text);
        let mut postings = self.postings.write().unwrap();
        postings.remove_doc(id);
        postings.insert_doc(id, &tokens);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.postings.write().unwrap().remove_doc(id);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredId>> {
        let mut query_terms = tokenize(query);
        query_terms.dedup();

        let postings = self.postings.read().unwrap();
        let doc_count = postings.doc_len.len();
        if doc_count == 0 || query_terms.is_empty() {
            return Ok(Vec::new());
        }
        let avgdl = postings.avg_doc_len();

        let mut scores: HashMap<&str, f32> = HashMap::new();
        for term in &query_terms {
            let Some(matches) = postings.terms.get(term) else {
                continue;
            };
            let df = matches.len() as f32;
            let idf = (1.0 + (doc_count as f32 - df + 0.5) / (df + 0.5)).ln();
            for (id, &tf) in matches {
                let dl = postings.doc_len.get(id).copied().unwrap_or(0) as f32;
                let tf = tf as f32;
                let norm = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avgdl.max(1.0));
                *scores.entry(id.as_str()).or_default() += idf * tf * (BM25_K1 + 1.0) / norm;
            }
        }

        let mut results: Vec<ScoredId> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .map(|(id, score)| ScoredId::new(id, score))
            .collect();
        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);
        Ok(results)
    }

    async fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.postings.read().unwrap().doc_len.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_keeps_mixed_hangul_tokens() {
        let tokens = tokenize("3주차 과제: 6/20까지 제출");
        assert!(tokens.contains(&"3주차".to_string()));
        assert!(tokens.contains(&"과제".to_string()));
        assert!(tokens.contains(&"제출".to_string()));
    }

    #[tokio::test]
    async fn test_exact_token_match_wins() {
        let index = LexicalIndex::new();
        index.index("a", "3주차 과제 제출 안내").await.unwrap();
        index.index("b", "중간고사 일정 공지").await.unwrap();

        let results = index.search("3주차 과제", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "a");
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_remove_excludes_record_from_search() {
        let index = LexicalIndex::new();
        index.index("a", "과제 제출").await.unwrap();
        index.remove("a").await.unwrap();

        assert!(index.search("과제", 10).await.unwrap().is_empty());
        assert!(!index.contains("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_reindex_replaces_entry() {
        let index = LexicalIndex::new();
        index.index("a", "기말고사 공지").await.unwrap();
        index.index("a", "과제 제출 안내").await.unwrap();

        assert!(index.search("기말고사", 10).await.unwrap().is_empty());
        assert_eq!(index.search("과제", 10).await.unwrap().len(), 1);
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_more_occurrences_score_higher() {
        let index = LexicalIndex::new();
        index.index("a", "과제 과제 과제 제출").await.unwrap();
        index.index("b", "과제 일정 공지 안내").await.unwrap();

        let results = index.search("과제", 10).await.unwrap();
        assert_eq!(results[0].id, "a");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let index = LexicalIndex::new();
        assert!(index.search("과제", 10).await.unwrap().is_empty());
    }
}
