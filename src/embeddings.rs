//! Embeddings client for the `/embeddings` endpoint

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::llm_client::EmbeddingClient;
use crate::transport::{self, Transport};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Path of the embeddings endpoint
pub const EMBEDDINGS_PATH: &str = "/embeddings";

/// An embedding vector
pub type Embedding = Vec<f32>;

/// Body sent to the embeddings endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingRequest<'a> {
    /// Text to embed
    pub text: &'a str,
}

/// Embeddings client for a self-hosted LLM API server
///
/// Generation parameters and the streaming flag in the configuration are ignored.
#[derive(Debug, Clone, Default)]
pub struct ApiEmbeddings {
    config: ClientConfig,
}

impl ApiEmbeddings {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Embed one text, returning the decoded array without conversion
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<Value>> {
        let url = self.config.endpoint(EMBEDDINGS_PATH);
        debug!(%url, len = text.len(), "requesting embedding");

        let body = serde_json::to_vec(&EmbeddingRequest { text })?;
        let transport = Transport::open(&self.config)?;
        let response = transport.post_json(&url, body, None).await?;
        let bytes = response.bytes().await?;

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Embed one text
    pub async fn embed_one(&self, text: &str) -> Result<Embedding> {
        to_embedding(self.embed_raw(text).await?)
    }

    /// Embed each text with its own request, preserving input order
    pub async fn embed_many(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_one(text).await?);
        }
        Ok(embeddings)
    }

    /// Embed a search query (same request as [`ApiEmbeddings::embed_one`])
    pub async fn embed_query(&self, text: &str) -> Result<Embedding> {
        self.embed_one(text).await
    }

    /// Blocking form of [`ApiEmbeddings::embed_many`]
    pub fn embed_many_blocking(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        transport::block_on(self.embed_many(texts))?
    }

    /// Blocking form of [`ApiEmbeddings::embed_query`]
    pub fn embed_query_blocking(&self, text: &str) -> Result<Embedding> {
        transport::block_on(self.embed_query(text))?
    }
}

#[async_trait]
impl EmbeddingClient for ApiEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
        self.embed_many(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding> {
        ApiEmbeddings::embed_query(self, text).await
    }
}

/// Convert decoded JSON values to floats, failing on the first that is not numeric
///
/// Numbers, numeric strings and booleans are accepted.
pub fn to_embedding(raw: Vec<Value>) -> Result<Embedding> {
    let mut embedding = Vec::with_capacity(raw.len());
    for (index, value) in raw.into_iter().enumerate() {
        match component(&value) {
            Some(x) => embedding.push(x),
            None => return Err(Error::invalid_embedding(index, value)),
        }
    }
    Ok(embedding)
}

fn component(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|x| x as f32),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
