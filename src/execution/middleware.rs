//! Middleware pipeline
//!
//! Middleware observe and rewrite every call going through the core:
//! - `intercept_request`: before the transport sends the descriptor
//! - `intercept_response`: on the raw one-shot response (and on error or
//!   non-SSE bodies of streaming calls) before decoding
//! - `intercept_frame`: on every stream frame before decoding
//!
//! All three hooks run in registration order. Post-receive hooks are NOT
//! applied in reverse.
//!
//! Hooks are expected to be total. A middleware that wants a call to fail
//! should rewrite the request so the network stage fails (e.g. point it at an
//! invalid URL) rather than panic mid-pipeline.

use std::fmt;
use std::sync::Arc;

use crate::execution::http::RawResponse;
use crate::execution::request::RequestDescriptor;
use crate::streaming::Frame;

/// Pre-send / post-receive interceptor.
pub trait Middleware: Send + Sync {
    /// Name used in log records.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn intercept_request(&self, request: RequestDescriptor) -> RequestDescriptor {
        request
    }

    fn intercept_response(
        &self,
        _request: &RequestDescriptor,
        response: RawResponse,
    ) -> RawResponse {
        response
    }

    fn intercept_frame(&self, _request: &RequestDescriptor, frame: Frame) -> Frame {
        frame
    }
}

/// Ordered, immutable list of middleware shared by all calls of a client.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    middlewares: Arc<[Arc<dyn Middleware>]>,
}

impl MiddlewarePipeline {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            middlewares: middlewares.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Apply every `intercept_request` in registration order.
    pub fn prepare(&self, request: RequestDescriptor) -> RequestDescriptor {
        self.middlewares.iter().fold(request, |req, m| {
            tracing::trace!(middleware = m.name(), "intercept_request");
            m.intercept_request(req)
        })
    }

    /// Apply every `intercept_response` in registration order.
    pub fn handle(&self, request: &RequestDescriptor, response: RawResponse) -> RawResponse {
        self.middlewares.iter().fold(response, |resp, m| {
            tracing::trace!(middleware = m.name(), "intercept_response");
            m.intercept_response(request, resp)
        })
    }

    /// Apply every `intercept_frame` in registration order.
    pub fn handle_frame(&self, request: &RequestDescriptor, frame: Frame) -> Frame {
        self.middlewares
            .iter()
            .fold(frame, |f, m| m.intercept_frame(request, f))
    }
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.middlewares.iter().map(|m| m.name()))
            .finish()
    }
}

impl From<Vec<Arc<dyn Middleware>>> for MiddlewarePipeline {
    fn from(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self::new(middlewares)
    }
}
