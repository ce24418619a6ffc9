//! Capability traits for completion and embedding backends
//!
//! Calling code written against these traits can swap a self-hosted model server
//! for any other conforming backend.

use crate::embeddings::Embedding;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A backend that turns a prompt into completion text
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion, halting at any of the `stop` sequences
    async fn complete(&self, prompt: &str, stop: Option<&[String]>) -> Result<String>;

    /// Parameters that identify this backend (for logging and cache keys)
    fn identifying_params(&self) -> Map<String, Value>;

    /// Short identifier of the backend kind
    fn llm_type(&self) -> &str;
}

/// A backend that turns text into vectors
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed each document, preserving input order
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Embedding>;
}
