//! Error types for the llm-api clients

use thiserror::Error;

/// Boxed cause carried by [`Error::Stream`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for llm-api operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the completion and embeddings clients
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport error (connection refused, timeout, retries exhausted)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport or framing failure while reading a server-sent event stream
    #[error("Event stream interrupted: {source}")]
    Stream {
        /// Underlying error, a `reqwest::Error` when the transport failed
        #[source]
        source: BoxError,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An embedding component could not be converted to a float
    #[error("Invalid embedding component at index {index}: {value}")]
    InvalidEmbedding {
        /// Position of the offending element in the vector
        index: usize,
        /// The element as decoded from JSON
        value: serde_json::Value,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The blocking wrappers could not start their runtime
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// A blocking wrapper was called from inside an async runtime
    #[error("Blocking call made from within an async runtime; use the async method instead")]
    NestedRuntime,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap an error raised mid-stream
    pub fn stream(source: impl Into<BoxError>) -> Self {
        Self::Stream {
            source: source.into(),
        }
    }

    /// Create an invalid embedding error
    pub fn invalid_embedding(index: usize, value: serde_json::Value) -> Self {
        Self::InvalidEmbedding { index, value }
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::Config(format!("invalid host URL: {}", err))
    }
}
