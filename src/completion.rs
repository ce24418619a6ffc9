//! Completion client for the `/generate` and `/agenerate` endpoints
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use llm_api::{ClientConfig, LlmApi};
//!
//! # async fn run() -> llm_api::Result<()> {
//! let llm = LlmApi::new(
//!     ClientConfig::new("http://localhost:8000")
//!         .with_param("n_predict", 300)
//!         .with_param("temp", 0.2),
//! );
//! let text = llm.complete("This is a prompt.", None).await?;
//! # Ok(())
//! # }
//! ```

use crate::callbacks::TokenHandler;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::llm_client::LlmClient;
use crate::sse::EventStream;
use crate::transport::{self, Transport, EVENT_STREAM};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Backend identifier reported by [`LlmApi::llm_type`]
pub const LLM_TYPE: &str = "llm-api";

/// Path of the single-response endpoint
pub const GENERATE_PATH: &str = "/generate";

/// Path of the event-stream endpoint
pub const STREAM_PATH: &str = "/agenerate";

/// Completion fragments in arrival order
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Body sent to the generation endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    /// Prompt to complete
    pub prompt: String,
    /// Generation parameters, including the `stop` list
    pub params: Map<String, Value>,
}

impl CompletionRequest {
    /// Merge per-call stop sequences over the base parameters
    pub fn new(prompt: impl Into<String>, base: &Map<String, Value>, stop: Option<&[String]>) -> Self {
        let mut params = base.clone();
        params.insert("stop".to_string(), Value::from(stop.unwrap_or_default().to_vec()));

        Self {
            prompt: prompt.into(),
            params,
        }
    }
}

/// How token notifications are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallMode {
    Async,
    Blocking,
}

/// Client for a self-hosted LLM API server
pub struct LlmApi {
    config: ClientConfig,
    token_handler: Option<Arc<dyn TokenHandler>>,
}

impl LlmApi {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            token_handler: None,
        }
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    /// Register a handler notified of every streamed fragment
    pub fn with_token_handler(mut self, handler: Arc<dyn TokenHandler>) -> Self {
        self.token_handler = Some(handler);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Generate a completion for `prompt`
    ///
    /// Without streaming the response body is returned verbatim, whatever its HTTP
    /// status. With streaming the event payloads are concatenated in arrival order.
    pub async fn complete(&self, prompt: &str, stop: Option<&[String]>) -> Result<String> {
        self.run(prompt, stop, CallMode::Async).await
    }

    /// Blocking form of [`LlmApi::complete`]
    ///
    /// Runs on a private runtime. Returns [`Error::NestedRuntime`](crate::Error::NestedRuntime)
    /// when called from inside an async runtime.
    pub fn complete_blocking(&self, prompt: &str, stop: Option<&[String]>) -> Result<String> {
        transport::block_on(self.run(prompt, stop, CallMode::Blocking))?
    }

    /// Stream completion fragments from `/agenerate`, regardless of `streaming`
    ///
    /// The token handler is not invoked; the caller consumes the fragments.
    pub async fn stream(&self, prompt: &str, stop: Option<&[String]>) -> Result<TokenStream> {
        let request = CompletionRequest::new(prompt, &self.config.params, stop);
        let events = self.open_event_stream(&request).await?;
        Ok(Box::pin(events.map_ok(|event| event.data)))
    }

    /// Parameters that identify this client: `host_name` plus every generation parameter
    pub fn identifying_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("host_name".to_string(), Value::from(self.config.host_name.clone()));
        params.extend(self.config.params.clone());
        params
    }

    /// Backend identifier
    pub fn llm_type(&self) -> &str {
        LLM_TYPE
    }

    async fn run(&self, prompt: &str, stop: Option<&[String]>, mode: CallMode) -> Result<String> {
        let request = CompletionRequest::new(prompt, &self.config.params, stop);

        if self.config.streaming {
            self.stream_completion(&request, mode).await
        } else {
            self.generate(&request).await
        }
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let url = self.config.endpoint(GENERATE_PATH);
        debug!(%url, "requesting completion");

        let body = serde_json::to_vec(request)?;
        let transport = Transport::open(&self.config)?;
        let response = transport.post_json(&url, body, None).await?;

        Ok(response.text().await?)
    }

    async fn open_event_stream(&self, request: &CompletionRequest) -> Result<EventStream> {
        let url = self.config.endpoint(STREAM_PATH);
        debug!(%url, "requesting streamed completion");

        let body = serde_json::to_vec(request)?;
        let transport = Transport::open(&self.config)?;
        let response = transport.post_json(&url, body, Some(EVENT_STREAM)).await?;

        Ok(EventStream::from_response(response))
    }

    async fn stream_completion(&self, request: &CompletionRequest, mode: CallMode) -> Result<String> {
        let mut events = self.open_event_stream(request).await?;
        let completion = self.accumulate(&mut events, mode).await;
        events.close();
        completion
    }

    async fn accumulate(&self, events: &mut EventStream, mode: CallMode) -> Result<String> {
        let mut completion = String::new();

        while let Some(event) = events.next().await {
            let event = event?;
            completion.push_str(&event.data);

            if let Some(handler) = &self.token_handler {
                if mode == CallMode::Async && handler.is_async() {
                    handler.on_new_token_async(&event.data).await;
                } else {
                    handler.on_new_token(&event.data);
                }
            }
        }

        Ok(completion)
    }
}

impl Default for LlmApi {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl std::fmt::Debug for LlmApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmApi")
            .field("config", &self.config)
            .field("token_handler", &self.token_handler.is_some())
            .finish()
    }
}

#[async_trait]
impl LlmClient for LlmApi {
    async fn complete(&self, prompt: &str, stop: Option<&[String]>) -> Result<String> {
        LlmApi::complete(self, prompt, stop).await
    }

    fn identifying_params(&self) -> Map<String, Value> {
        LlmApi::identifying_params(self)
    }

    fn llm_type(&self) -> &str {
        LlmApi::llm_type(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct RecordingHandler {
        sync_tokens: Mutex<Vec<String>>,
        async_tokens: Mutex<Vec<String>>,
        is_async: bool,
    }

    impl RecordingHandler {
        fn asynchronous() -> Self {
            Self {
                is_async: true,
                ..Self::default()
            }
        }

        fn sync_tokens(&self) -> Vec<String> {
            self.sync_tokens.lock().unwrap().clone()
        }

        fn async_tokens(&self) -> Vec<String> {
            self.async_tokens.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TokenHandler for RecordingHandler {
        fn on_new_token(&self, token: &str) {
            self.sync_tokens.lock().unwrap().push(token.to_string());
        }

        async fn on_new_token_async(&self, token: &str) {
            tokio::task::yield_now().await;
            self.async_tokens.lock().unwrap().push(token.to_string());
        }

        fn is_async(&self) -> bool {
            self.is_async
        }
    }

    fn stops(stop: &[&str]) -> Vec<String> {
        stop.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_request_merges_stop_over_params() {
        let base = ClientConfig::default().with_param("n_predict", 300).params;
        let stop = stops(&["\n", "###"]);

        let request = CompletionRequest::new("Hi", &base, Some(&stop));

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"prompt": "Hi", "params": {"n_predict": 300, "stop": ["\n", "###"]}})
        );
        assert!(!base.contains_key("stop"));
    }

    #[test]
    fn test_request_without_stop_sends_empty_list() {
        let request = CompletionRequest::new("Hi", &Map::new(), None);
        assert_eq!(request.params["stop"], json!([]));
    }

    #[tokio::test]
    async fn test_complete_returns_raw_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "prompt": "This is a prompt.",
                "params": {"n_predict": 300, "temp": 0.2, "stop": ["Human:"]}
            })))
            .with_body("  a completion, not JSON {\n")
            .create_async()
            .await;

        let llm = LlmApi::new(
            ClientConfig::new(server.url())
                .with_param("n_predict", 300)
                .with_param("temp", 0.2),
        );
        let text = llm
            .complete("This is a prompt.", Some(&stops(&["Human:"])))
            .await
            .unwrap();

        assert_eq!(text, "  a completion, not JSON {\n");
        assert!(!llm.config().params.contains_key("stop"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_without_stop_sends_empty_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate")
            .match_body(Matcher::Json(json!({"prompt": "p", "params": {"stop": []}})))
            .with_body("done")
            .create_async()
            .await;

        let llm = LlmApi::new(ClientConfig::new(server.url()));
        assert_eq!(llm.complete("p", None).await.unwrap(), "done");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_passes_through_error_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let llm = LlmApi::new(ClientConfig::new(server.url()));
        assert_eq!(llm.complete("p", None).await.unwrap(), "model not loaded");
    }

    #[tokio::test]
    async fn test_streaming_concatenates_and_notifies_in_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/agenerate")
            .match_header("accept", "text/event-stream")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({"prompt": "Say hello"})))
            .with_header("content-type", "text/event-stream")
            .with_body("data: Hel\n\ndata: lo\n\n")
            .create_async()
            .await;

        let handler = Arc::new(RecordingHandler::default());
        let llm = LlmApi::new(ClientConfig::new(server.url()).with_streaming(true))
            .with_token_handler(handler.clone());

        let text = llm.complete("Say hello", None).await.unwrap();

        assert_eq!(text, "Hello");
        assert_eq!(handler.sync_tokens(), vec!["Hel", "lo"]);
        assert!(handler.async_tokens().is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_streaming_awaits_async_handler() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/agenerate")
            .with_body("data: a\n\ndata: b\n\ndata: c\n\n")
            .create_async()
            .await;

        let handler = Arc::new(RecordingHandler::asynchronous());
        let llm = LlmApi::new(ClientConfig::new(server.url()).with_streaming(true))
            .with_token_handler(handler.clone());

        assert_eq!(llm.complete("p", None).await.unwrap(), "abc");
        assert_eq!(handler.async_tokens(), vec!["a", "b", "c"]);
        assert!(handler.sync_tokens().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_delivers_empty_fragments() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/agenerate")
            .with_body("data: a\n\ndata:\n\n: keep-alive\n\ndata: b\n\n")
            .create_async()
            .await;

        let handler = Arc::new(RecordingHandler::default());
        let llm = LlmApi::new(ClientConfig::new(server.url()).with_streaming(true))
            .with_token_handler(handler.clone());

        assert_eq!(llm.complete("p", None).await.unwrap(), "ab");
        assert_eq!(handler.sync_tokens(), vec!["a", "", "b"]);
    }

    #[test]
    fn test_complete_blocking_streaming_uses_sync_handler() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/agenerate")
            .with_body("data: Hel\n\ndata: lo\n\n")
            .create();

        let handler = Arc::new(RecordingHandler::asynchronous());
        let llm = LlmApi::new(ClientConfig::new(server.url()).with_streaming(true))
            .with_token_handler(handler.clone());

        assert_eq!(llm.complete_blocking("p", None).unwrap(), "Hello");
        assert_eq!(handler.sync_tokens(), vec!["Hel", "lo"]);
        assert!(handler.async_tokens().is_empty());
    }

    #[test]
    fn test_complete_blocking() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/generate")
            .match_body(Matcher::Json(json!({"prompt": "p", "params": {"stop": ["x"]}})))
            .with_body("blocking result")
            .create();

        let llm = LlmApi::new(ClientConfig::new(server.url()));
        let text = llm.complete_blocking("p", Some(&stops(&["x"]))).unwrap();

        assert_eq!(text, "blocking result");
        mock.assert();
    }

    #[tokio::test]
    async fn test_complete_blocking_inside_runtime_is_an_error() {
        let llm = LlmApi::new(ClientConfig::default());

        let err = llm.complete_blocking("p", None).unwrap_err();
        assert!(matches!(err, Error::NestedRuntime), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_stream_yields_fragments() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/agenerate")
            .with_body(": keep-alive\n\ndata: one\n\ndata:  two\n\n")
            .create_async()
            .await;

        let llm = LlmApi::new(ClientConfig::new(server.url()));
        let fragments: Vec<String> = llm
            .stream("p", None)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(fragments, vec!["one", " two"]);
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    return;
                }
            }
        }
    }

    /// Serves one event then drops the connection before the chunked body ends
    async fn truncated_stream_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      content-type: text/event-stream\r\n\
                      transfer-encoding: chunked\r\n\r\n\
                      b\r\ndata: Hel\n\n\r\n",
                )
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_streaming_transport_error_is_stream_failure() {
        let host = truncated_stream_server().await;
        let handler = Arc::new(RecordingHandler::default());
        let llm = LlmApi::new(ClientConfig::new(host).with_streaming(true))
            .with_token_handler(handler.clone());

        let err = llm.complete("p", None).await.unwrap_err();

        match err {
            Error::Stream { source } => assert!(source.downcast_ref::<reqwest::Error>().is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(handler.sync_tokens(), vec!["Hel"]);
    }

    #[tokio::test]
    async fn test_event_stream_released_after_transport_error() {
        let host = truncated_stream_server().await;
        let llm = LlmApi::new(ClientConfig::new(host));
        let request = CompletionRequest::new("p", &Map::new(), None);

        let mut events = llm.open_event_stream(&request).await.unwrap();
        let mut saw_error = false;
        while let Some(event) = events.next().await {
            if event.is_err() {
                saw_error = true;
            }
        }

        assert!(saw_error);
        assert!(events.is_closed());
    }

    #[test]
    fn test_identifying_params() {
        let llm = LlmApi::new(
            ClientConfig::new("http://gpu-box:8000")
                .with_param("n_predict", 300)
                .with_param("temp", 0.2),
        );

        assert_eq!(
            Value::Object(llm.identifying_params()),
            json!({"host_name": "http://gpu-box:8000", "n_predict": 300, "temp": 0.2})
        );
    }

    #[tokio::test]
    async fn test_llm_client_trait_object() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/generate")
            .with_body("via trait")
            .create_async()
            .await;

        let client: Arc<dyn LlmClient> = Arc::new(LlmApi::new(ClientConfig::new(server.url())));

        assert_eq!(client.llm_type(), "llm-api");
        assert!(client.identifying_params().contains_key("host_name"));
        assert_eq!(client.complete("p", None).await.unwrap(), "via trait");
    }
}
