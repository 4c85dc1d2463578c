//! Semantic index - embedding vectors with cosine nearest-neighbor search.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::{embedder::Embedder, index::SearchIndex};
use crate::types::candidate::ScoredId;

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// In-memory vector index over record embeddings.
///
/// Embedding happens outside the lock; the vector table swap is atomic per
/// id, so concurrent searches see either the old or the new entry.
pub struct SemanticIndex<E: Embedder> {
    embedder: E,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl<E: Embedder> SemanticIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            vectors: RwLock::new(HashMap::new()),
        }
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.vectors.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<E: Embedder> SearchIndex for SemanticIndex<E> {
    async fn index(&self, id: &str, text: &str) -> Result<()> {
        let embedding = self.embedder.embed(text).await?;
        self.vectors
            .write()
            .unwrap()
            .insert(id.to_string(), embedding);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.vectors.write().unwrap().remove(id);
        Ok(())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredId>> {
        if self.vectors.read().unwrap().is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed(query).await?;

        let vectors = self.vectors.read().unwrap();
        let mut results: Vec<ScoredId> = vectors
            .iter()
            .filter_map(|(id, embedding)| {
                let score = cosine_similarity(&query_embedding, embedding);
                // A non-positive cosine is not a neighbor.
                (score > 0.0).then(|| ScoredId::new(id.clone(), score))
            })
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
        Ok(self.vectors.read().unwrap().contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEmbedder;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &c).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_nearest_neighbor_ordering() {
        let embedder = MockEmbedder::new()
            .with_embedding("과제 제출 안내", vec![1.0, 0.0, 0.0])
            .with_embedding("시험 일정 공지", vec![0.0, 1.0, 0.0])
            .with_embedding("과제 마감", vec![0.9, 0.1, 0.0]);
        let index = SemanticIndex::new(embedder);

        index.index("a", "과제 제출 안내").await.unwrap();
        index.index("b", "시험 일정 공지").await.unwrap();

        let results = index.search("과제 마감", 10).await.unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn test_orthogonal_vectors_are_not_neighbors() {
        let embedder = MockEmbedder::new()
            .with_embedding("doc", vec![1.0, 0.0])
            .with_embedding("query", vec![0.0, 1.0]);
        let index = SemanticIndex::new(embedder);

        index.index("a", "doc").await.unwrap();

        assert!(index.search("query", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_and_replace() {
        let index = SemanticIndex::new(MockEmbedder::new());

        index.index("a", "첫 번째 내용").await.unwrap();
        assert!(index.contains("a").await.unwrap());

        index.index("a", "교체된 내용").await.unwrap();
        assert_eq!(index.len(), 1);

        index.remove("a").await.unwrap();
        assert!(!index.contains("a").await.unwrap());
        assert!(index.is_empty());
    }
}
