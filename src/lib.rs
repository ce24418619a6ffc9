//! # llm-api
//!
//! Completion and embeddings clients for self-hosted LLM API servers.
//!
//! The server exposes three endpoints:
//!
//! - `POST /generate` returns the completion as plain text
//! - `POST /agenerate` streams completion fragments as server-sent events
//! - `POST /embeddings` returns a JSON array of numbers
//!
//! [`LlmApi`] and [`ApiEmbeddings`] implement the [`LlmClient`] and
//! [`EmbeddingClient`] traits, so calling code can swap a local model server for
//! any other backend implementing them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_api::{ApiEmbeddings, ClientConfig, LlmApi, StdoutTokenHandler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::new("http://localhost:8000")
//!         .with_param("n_predict", 300)
//!         .with_param("temp", 0.2);
//!
//!     let llm = LlmApi::new(config.clone().with_streaming(true))
//!         .with_token_handler(Arc::new(StdoutTokenHandler));
//!     let text = llm.complete("Once upon a time", Some(&["\n\n".to_string()])).await?;
//!
//!     let embeddings = ApiEmbeddings::new(config);
//!     let vector = embeddings.embed_query(&text).await?;
//!     println!("{} dimensions", vector.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod callbacks;
pub mod completion;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod llm_client;
pub mod sse;
mod transport;

// Re-exports for convenience
pub use callbacks::{StdoutTokenHandler, TokenHandler};
pub use completion::{CompletionRequest, LlmApi, TokenStream};
pub use config::{ClientConfig, RequestTimeout};
pub use embeddings::{ApiEmbeddings, Embedding, EmbeddingRequest};
pub use error::{Error, Result};
pub use llm_client::{EmbeddingClient, LlmClient};
pub use sse::EventStream;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::callbacks::TokenHandler;
    pub use crate::completion::LlmApi;
    pub use crate::config::ClientConfig;
    pub use crate::embeddings::{ApiEmbeddings, Embedding};
    pub use crate::error::{Error, Result};
    pub use crate::llm_client::{EmbeddingClient, LlmClient};
}
