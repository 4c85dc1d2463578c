//! Model-backed implementations of the external interfaces.

mod ollama;

pub use ollama::{OllamaEmbedder, OllamaStructurer};
