//! HTTP transport abstraction.
//!
//! The core never talks to `reqwest` directly; it goes through `Transport`,
//! so tests and embedders can inject a synthetic transport.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{CONTENT_TYPE, HeaderMap};

use crate::error::ClientError;
use crate::execution::request::RequestDescriptor;

/// Incrementally read response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Fully read response of a one-shot call.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        content_type(&self.headers)
    }
}

/// Open streaming response. Dropping `body` closes the connection.
pub struct StreamingResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: ByteStream,
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        content_type(&self.headers)
    }

    /// Whether the server answered with `text/event-stream`.
    pub fn is_event_stream(&self) -> bool {
        self.content_type()
            .map(|ct| ct.to_ascii_lowercase().contains("text/event-stream"))
            .unwrap_or(false)
    }
}

impl fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Pluggable network layer.
///
/// Implementations report connection failures, timeouts and broken bodies as
/// transport errors (`ConnectionError`, `TimeoutError`, `HttpError`); they do
/// not interpret status codes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a one-shot request and read the whole body.
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, ClientError>;

    /// Issue a request and return as soon as the response head is available.
    /// The body is read incrementally; dropping it cancels the call.
    async fn open_stream(
        &self,
        request: &RequestDescriptor,
    ) -> Result<StreamingResponse, ClientError>;
}
