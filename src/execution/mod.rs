//! Execution Module
//!
//! The shared request-execution core and its building blocks:
//! - `request`: immutable request descriptors
//! - `url`: endpoint template resolution
//! - `middleware`: pre-send / post-receive interceptors
//! - `http`: transport abstraction and the reqwest transport
//! - `decoder`: status + body to typed result or typed error
//! - `serializer`: the process-wide ordered delivery queue
//! - `core`: one-shot and streaming execution used by every facade

pub mod core;
pub mod decoder;
pub mod http;
pub mod middleware;
pub mod request;
pub mod serializer;
pub mod url;

pub use self::core::ExecutionCore;
pub use decoder::{ApiErrorPayload, ResponseDecoder};
pub use http::{ByteStream, RawResponse, ReqwestTransport, StreamingResponse, Transport};
pub use middleware::{Middleware, MiddlewarePipeline};
pub use request::{RequestDescriptor, RequestDescriptorBuilder};
pub use serializer::ExecutionSerializer;
pub use url::{EndpointTemplate, UrlBuilder};

/// Generate a unique request id.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
