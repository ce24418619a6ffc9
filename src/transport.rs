//! Per-call HTTP transport
//!
//! Every request builds its own `reqwest::Client`, so no connection pool is shared
//! between calls. Connection failures are retried up to `max_retries` times;
//! failures after the request reached the server are never retried.

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::future::Future;
use tracing::{debug, warn};

/// MIME type of every request body
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// MIME type requested for streaming completions
pub const EVENT_STREAM: &str = "text/event-stream";

/// HTTP session scoped to a single call
pub(crate) struct Transport {
    client: Client,
    max_retries: u32,
}

impl Transport {
    /// Open a session honouring the configured timeouts
    pub(crate) fn open(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout.connect())
            .read_timeout(config.request_timeout.read())
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// POST a JSON body, optionally asking for a specific response type
    pub(crate) async fn post_json(
        &self,
        url: &str,
        body: impl Into<Bytes>,
        accept: Option<&str>,
    ) -> Result<Response> {
        let body = body.into();
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .post(url)
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(body.clone());
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }

            debug!(url, attempt, "sending request");
            match request.send().await {
                Ok(response) => {
                    debug!(url, status = %response.status(), "received response");
                    return Ok(response);
                }
                Err(err) if err.is_connect() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(url, attempt, max_retries = self.max_retries, error = %err, "connection failed, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Drive a future to completion on a private current-thread runtime
///
/// Used by the blocking wrappers. Fails with [`Error::NestedRuntime`] when called
/// from inside a tokio runtime, where starting another one would panic.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(Error::NestedRuntime);
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
