//! Ollama implementations of the structuring and embedding interfaces.
//!
//! A reference implementation against a local Ollama server: chat
//! completion in JSON mode for structuring, `/api/embeddings` for vectors.
//!
//! # Example
//!
//! ```rust,ignore
//! use refinery::ai::{OllamaStructurer, OllamaEmbedder};
//!
//! let structurer = OllamaStructurer::new().with_model("gpt-oss:20b");
//! let extractor = FactExtractor::new(structurer);
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{RefineryError, Result, SchemaViolation};
use crate::traits::embedder::Embedder;
use crate::traits::structurer::{StructureRequest, StructuredPayload, Structurer};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama-backed structurer.
#[derive(Clone)]
pub struct OllamaStructurer {
    client: Client,
    base_url: String,
    model: String,
}

impl Default for OllamaStructurer {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaStructurer {
    /// Create a client against the default local Ollama server.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-oss:20b".to_string(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Get the current model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Strip markdown code fences some models wrap around JSON output.
fn strip_code_fences(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

#[async_trait]
impl Structurer for OllamaStructurer {
    async fn structure(&self, request: &StructureRequest) -> Result<StructuredPayload> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &request.raw_text,
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(RefineryError::unavailable)?;

        if !response.status().is_success() {
            return Err(RefineryError::unavailable(std::io::Error::other(format!(
                "Ollama API error: {}",
                response.status()
            ))));
        }

        let chat: ChatResponse = response.json().await.map_err(RefineryError::unavailable)?;

        // The response body arrived; failing to parse as the payload shape
        // is a validation failure, not a transport failure.
        let content = strip_code_fences(&chat.message.content);
        serde_json::from_str(content).map_err(|e| {
            SchemaViolation::new(
                "payload",
                format!("response did not parse as the structured payload shape: {e}"),
            )
            .into()
        })
    }
}

/// Ollama-backed embedder.
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

impl Default for OllamaEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl OllamaEmbedder {
    /// Create a client against the default local Ollama server.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| RefineryError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RefineryError::Embedding(format!(
                "Ollama API error: {}",
                response.status()
            )));
        }

        let embed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RefineryError::Embedding(e.to_string()))?;

        if embed.embedding.is_empty() {
            return Err(RefineryError::Embedding("empty embedding returned".into()));
        }
        Ok(embed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_payload_shape_parses() {
        let content = r#"{
            "category": "assignment",
            "real_date": "2025-03-14",
            "importance": 4,
            "summary": "과제 제출"
        }"#;
        let payload: StructuredPayload = serde_json::from_str(content).unwrap();
        assert_eq!(payload.category, "assignment");
        assert!(!payload.past_due_correction);
    }
}
