//! Embedding interface consumed by the semantic index.

use async_trait::async_trait;

use crate::error::Result;

/// Text embedding interface.
///
/// Must be deterministic enough that repeated embedding of identical text
/// yields index-stable vectors; the semantic index relies on this for
/// dedup-safe replacement.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate a fixed-length vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple texts.
    ///
    /// Default implementation embeds sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for &T {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for std::sync::Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }
}
