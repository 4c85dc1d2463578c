//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the refinery library
//! without making real model or network calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{RefineryError, Result, SchemaViolation};
use crate::traits::embedder::Embedder;
use crate::traits::structurer::{StructureRequest, StructuredPayload, Structurer};

/// A mock structuring interface for testing.
///
/// Responses are keyed by the request's `raw_text` (the request shape
/// carries no record id). Queued payloads are handed out in order, with the
/// last one repeating, so repair retries and idempotent re-extraction can
/// both be scripted.
#[derive(Default, Clone)]
pub struct MockStructurer {
    /// Scripted payload queues by raw text
    payloads: Arc<RwLock<HashMap<String, VecDeque<StructuredPayload>>>>,

    /// Remaining transport failures by raw text (usize::MAX = always)
    transport_failures: Arc<RwLock<HashMap<String, usize>>>,

    /// Raw texts whose responses never parse as the payload shape
    malformed: Arc<RwLock<Vec<String>>>,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<StructureRequest>>>,
}

impl MockStructurer {
    /// Create a new mock with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a single payload for a raw text (repeats on every call).
    pub fn with_payload(self, raw_text: impl Into<String>, payload: StructuredPayload) -> Self {
        self.with_payloads(raw_text, vec![payload])
    }

    /// Script a payload sequence for a raw text.
    ///
    /// Calls consume the queue front-to-back; the final payload repeats.
    pub fn with_payloads(
        self,
        raw_text: impl Into<String>,
        payloads: Vec<StructuredPayload>,
    ) -> Self {
        self.payloads
            .write()
            .unwrap()
            .insert(raw_text.into(), payloads.into());
        self
    }

    /// Every call for this raw text fails as `Unavailable`.
    pub fn fail_transport(self, raw_text: impl Into<String>) -> Self {
        self.transport_failures
            .write()
            .unwrap()
            .insert(raw_text.into(), usize::MAX);
        self
    }

    /// The first `count` calls for this raw text fail as `Unavailable`,
    /// then scripted payloads take over.
    pub fn fail_transport_times(self, raw_text: impl Into<String>, count: usize) -> Self {
        self.transport_failures
            .write()
            .unwrap()
            .insert(raw_text.into(), count);
        self
    }

    /// Responses for this raw text never parse as the payload shape
    /// (a validation failure, not a transport failure).
    pub fn with_malformed_response(self, raw_text: impl Into<String>) -> Self {
        self.malformed.write().unwrap().push(raw_text.into());
        self
    }

    /// All requests seen by this mock.
    pub fn calls(&self) -> Vec<StructureRequest> {
        self.calls.read().unwrap().clone()
    }

    /// Instruction texts of all requests, in call order.
    pub fn instructions(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(|r| r.instruction.clone())
            .collect()
    }

    /// Number of calls seen.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Default payload for unscripted raw texts.
    fn default_payload(raw_text: &str) -> StructuredPayload {
        StructuredPayload {
            category: "notice".to_string(),
            real_date: None,
            importance: 2,
            summary: format!("요약: {}", raw_text.chars().take(40).collect::<String>()),
            past_due_correction: false,
        }
    }
}

#[async_trait]
impl Structurer for MockStructurer {
    async fn structure(&self, request: &StructureRequest) -> Result<StructuredPayload> {
        self.calls.write().unwrap().push(request.clone());

        {
            let mut failures = self.transport_failures.write().unwrap();
            if let Some(remaining) = failures.get_mut(&request.raw_text) {
                if *remaining > 0 {
                    if *remaining != usize::MAX {
                        *remaining -= 1;
                    }
                    return Err(RefineryError::unavailable(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "mock connection refused",
                    )));
                }
            }
        }

        if self.malformed.read().unwrap().contains(&request.raw_text) {
            return Err(SchemaViolation::new(
                "payload",
                "response did not parse as the structured payload shape",
            )
            .into());
        }

        let mut payloads = self.payloads.write().unwrap();
        if let Some(queue) = payloads.get_mut(&request.raw_text) {
            if queue.len() > 1 {
                return Ok(queue.pop_front().expect("non-empty queue"));
            }
            if let Some(last) = queue.front() {
                return Ok(last.clone());
            }
        }

        Ok(Self::default_payload(&request.raw_text))
    }
}

/// A mock embedder with deterministic output.
///
/// Unscripted texts get a hash-derived vector, so identical text always
/// embeds identically and the semantic index stays dedup-safe.
#[derive(Clone)]
pub struct MockEmbedder {
    /// Predefined embeddings by text
    embeddings: Arc<RwLock<HashMap<String, Vec<f32>>>>,

    /// Dimension of generated embeddings
    dim: usize,

    /// Texts that should fail to embed
    fail_texts: Arc<RwLock<Vec<String>>>,

    /// Call tracking
    calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            embeddings: Arc::default(),
            dim: 64,
            fail_texts: Arc::default(),
            calls: Arc::default(),
        }
    }
}

impl MockEmbedder {
    /// Create a new mock embedder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generated embedding dimension.
    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    /// Add a predefined embedding for a text.
    pub fn with_embedding(self, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.embeddings
            .write()
            .unwrap()
            .insert(text.into(), embedding);
        self
    }

    /// Mark a text as failing to embed.
    pub fn fail_text(self, text: impl Into<String>) -> Self {
        self.fail_texts.write().unwrap().push(text.into());
        self
    }

    /// All texts embedded so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    /// Generate a deterministic embedding from a text hash.
    fn generate(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = hasher.finalize();

        (0..self.dim)
            .map(|i| {
                let byte = hash[i % 32] as f32;
                // Normalize to [-1, 1]
                (byte / 127.5) - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.write().unwrap().push(text.to_string());

        if self.fail_texts.read().unwrap().iter().any(|t| t == text) {
            return Err(RefineryError::Embedding(format!(
                "mock embedding failure for: {text}"
            )));
        }

        Ok(self
            .embeddings
            .read()
            .unwrap()
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.generate(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request(raw_text: &str) -> StructureRequest {
        StructureRequest {
            instruction: format!("structure: {raw_text}"),
            raw_text: raw_text.to_string(),
            anchor: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mock_structurer_queue_repeats_last() {
        let mock = MockStructurer::new().with_payloads(
            "text",
            vec![
                StructuredPayload {
                    category: "assignment".to_string(),
                    real_date: None,
                    importance: 7,
                    summary: "first".to_string(),
                    past_due_correction: false,
                },
                StructuredPayload {
                    category: "assignment".to_string(),
                    real_date: None,
                    importance: 4,
                    summary: "second".to_string(),
                    past_due_correction: false,
                },
            ],
        );

        assert_eq!(mock.structure(&request("text")).await.unwrap().importance, 7);
        assert_eq!(mock.structure(&request("text")).await.unwrap().importance, 4);
        // The last payload repeats.
        assert_eq!(mock.structure(&request("text")).await.unwrap().importance, 4);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_structurer_transport_failures_run_out() {
        let mock = MockStructurer::new().fail_transport_times("text", 2);

        assert!(mock.structure(&request("text")).await.is_err());
        assert!(mock.structure(&request("text")).await.is_err());
        assert!(mock.structure(&request("text")).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new().with_dim(32);

        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        let c = embedder.embed("world").await.unwrap();

        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
