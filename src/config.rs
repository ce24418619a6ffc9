//! Configuration types for the llm-api clients

use crate::error::{Error, Result};
use dotenvy::dotenv;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default model server address
pub const DEFAULT_HOST: &str = "http://localhost:8000";

/// Default request timeout (10 minutes, generation on local hardware is slow)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default number of connection-level retries
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Prefix shared by every environment variable the clients read
pub const ENV_PREFIX: &str = "LLM_API";

/// Request timeout applied at the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTimeout {
    /// One duration used for both connecting and reading
    Single(Duration),
    /// Separate connect and read durations
    Split {
        /// Time allowed to establish the connection
        connect: Duration,
        /// Time allowed between reads of the response
        read: Duration,
    },
}

impl RequestTimeout {
    /// Timeout for establishing the connection
    pub fn connect(&self) -> Duration {
        match *self {
            Self::Single(timeout) => timeout,
            Self::Split { connect, .. } => connect,
        }
    }

    /// Timeout for each read of the response body
    pub fn read(&self) -> Duration {
        match *self {
            Self::Single(timeout) => timeout,
            Self::Split { read, .. } => read,
        }
    }
}

impl Default for RequestTimeout {
    fn default() -> Self {
        Self::Single(DEFAULT_TIMEOUT)
    }
}

impl From<Duration> for RequestTimeout {
    fn from(timeout: Duration) -> Self {
        Self::Single(timeout)
    }
}

impl From<(Duration, Duration)> for RequestTimeout {
    fn from((connect, read): (Duration, Duration)) -> Self {
        Self::Split { connect, read }
    }
}

/// Client configuration shared by the completion and embeddings clients
///
/// The configuration is never mutated by a call: per-call values such as stop
/// sequences are merged into a fresh request instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the model server (e.g., "http://localhost:8000")
    pub host_name: String,
    /// Request timeout
    pub request_timeout: RequestTimeout,
    /// Maximum connection-level retries per request
    pub max_retries: u32,
    /// Generation parameters forwarded verbatim (e.g., `n_predict`, `temp`)
    pub params: Map<String, Value>,
    /// Use the event-stream endpoint for completions
    pub streaming: bool,
}

impl ClientConfig {
    /// Create a new configuration for the given host
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Reads `LLM_API_HOST_NAME`, `LLM_API_TIMEOUT_SECS`,
    /// `LLM_API_CONNECT_TIMEOUT_SECS`, `LLM_API_MAX_RETRIES` and
    /// `LLM_API_STREAMING`, after loading a `.env` file if one is present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{}_{}", ENV_PREFIX, name));

        let mut settings = ConfigFile {
            host_name: var("HOST_NAME"),
            ..ConfigFile::default()
        };
        if let Some(secs) = var("TIMEOUT_SECS") {
            settings.timeout_secs = Some(parse_var("TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = var("CONNECT_TIMEOUT_SECS") {
            settings.connect_timeout_secs = Some(parse_var("CONNECT_TIMEOUT_SECS", &secs)?);
        }
        if let Some(retries) = var("MAX_RETRIES") {
            settings.max_retries = Some(parse_var("MAX_RETRIES", &retries)?);
        }
        if let Some(streaming) = var("STREAMING") {
            settings.streaming = Some(parse_var("STREAMING", &streaming)?);
        }

        settings.into_config()
    }

    /// Load configuration from a file, overridden by `LLM_API_*` environment variables
    ///
    /// The file format is inferred from its extension. Generation parameters live
    /// in a `[params]` table:
    ///
    /// ```toml
    /// host_name = "http://gpu-box:8000"
    /// timeout_secs = 120
    /// streaming = true
    ///
    /// [params]
    /// n_predict = 300
    /// temp = 0.2
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        settings.try_deserialize::<ConfigFile>()?.into_config()
    }

    /// Set the host name
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    /// Set the timeout (a single duration or a `(connect, read)` pair)
    pub fn with_timeout(mut self, timeout: impl Into<RequestTimeout>) -> Self {
        self.request_timeout = timeout.into();
        self
    }

    /// Set the maximum number of connection-level retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set a single generation parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replace all generation parameters
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Enable or disable streaming completions
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Join an endpoint path onto the host
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.host_name, path)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host_name: DEFAULT_HOST.to_string(),
            request_timeout: RequestTimeout::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            params: Map::new(),
            streaming: false,
        }
    }
}

/// Flat representation used by file and environment sources
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    host_name: Option<String>,
    timeout_secs: Option<f64>,
    connect_timeout_secs: Option<f64>,
    max_retries: Option<u32>,
    streaming: Option<bool>,
    params: Map<String, Value>,
}

impl ConfigFile {
    fn into_config(self) -> Result<ClientConfig> {
        let mut config = ClientConfig::default();

        if let Some(host_name) = self.host_name {
            Url::parse(&host_name)?;
            config.host_name = host_name.trim_end_matches('/').to_string();
        }

        let read = self.timeout_secs.map(seconds).transpose()?;
        let connect = self.connect_timeout_secs.map(seconds).transpose()?;
        config.request_timeout = match (connect, read) {
            (Some(connect), Some(read)) => RequestTimeout::Split { connect, read },
            (Some(connect), None) => RequestTimeout::Split {
                connect,
                read: DEFAULT_TIMEOUT,
            },
            (None, Some(read)) => RequestTimeout::Single(read),
            (None, None) => RequestTimeout::default(),
        };

        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(streaming) = self.streaming {
            config.streaming = streaming;
        }
        config.params = self.params;

        Ok(config)
    }
}

fn seconds(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::config(format!("invalid timeout {}: {}", secs, e)))
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::config(format!("{}_{}={:?}: {}", ENV_PREFIX, name, raw, e)))
}
