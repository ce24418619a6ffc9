//! Server-sent events read from a streamed HTTP body

use crate::error::{Error, Result};
use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, trace};

pub use eventsource_stream::Event;

type RawEvents =
    Pin<Box<dyn Stream<Item = std::result::Result<Event, EventStreamError<reqwest::Error>>> + Send>>;

/// Stream of events read from an open HTTP response
///
/// The underlying connection is released by [`EventStream::close`], when the body
/// ends, when an error is yielded, or when the stream is dropped.
pub struct EventStream {
    inner: Option<RawEvents>,
}

impl EventStream {
    /// Wrap any byte stream (usually `reqwest::Response::bytes_stream`)
    pub fn new(stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            inner: Some(Box::pin(stream.eventsource())),
        }
    }

    /// Read events from the body of a streamed response
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(response.bytes_stream())
    }

    /// Release the connection and discard undelivered events
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            debug!("event stream closed");
        }
    }

    /// Whether the underlying connection has been released
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for EventStream {
    type Item = Result<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match futures::ready!(inner.as_mut().poll_next(cx)) {
            Some(Ok(event)) => {
                trace!(event = %event.event, len = event.data.len(), "event received");
                Poll::Ready(Some(Ok(event)))
            }
            Some(Err(err)) => {
                this.close();
                let err = match err {
                    EventStreamError::Transport(source) => Error::stream(source),
                    other => Error::stream(other.to_string()),
                };
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.inner = None;
                debug!("event stream ended");
                Poll::Ready(None)
            }
        }
    }
}
