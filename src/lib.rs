//! siumai-exec
//!
//! Request execution core for OpenAI-style HTTP APIs.
//!
//! A typed request travels through one shared pipeline regardless of how the
//! caller wants the result delivered:
//!
//! ```text
//! RequestDescriptor -> MiddlewarePipeline::prepare -> Transport
//!   one-shot:  RawResponse -> MiddlewarePipeline::handle -> ResponseDecoder -> ExecutionSerializer -> caller
//!   streaming: bytes -> FrameParser -> MiddlewarePipeline::handle_frame -> ResponseDecoder -> ExecutionSerializer -> caller
//! ```
//!
//! The four facades on [`ApiClient`] (callback, async, reactive stream and raw
//! streaming callbacks) are thin adapters over [`execution::ExecutionCore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use siumai_exec::prelude::*;
//!
//! #[derive(serde::Deserialize)]
//! struct Model { id: String }
//!
//! let client = ApiClient::builder()
//!     .config(ClientConfig::builder().token("sk-...").build())
//!     .build()?;
//! let request = client.request(Method::GET, "/models/{model}", &[("model", "gpt-4o")])?.build();
//! let model: Model = client.perform_async(request).await?;
//! ```
#![deny(unsafe_code)]

pub mod client;
pub mod defaults;
pub mod error;
pub mod execution;
pub mod facade;
pub mod observability;
pub mod streaming;
pub mod types;
pub mod utils;

pub use client::{ApiClient, ApiClientBuilder};
pub use error::{ClientError, ErrorCategory};
pub use facade::ResultStream;
pub use utils::cancel::{HandleState, RequestHandle};

/// Commonly used items.
pub mod prelude {
    pub use crate::client::{ApiClient, ApiClientBuilder};
    pub use crate::error::{ClientError, ErrorCategory};
    pub use crate::execution::{
        EndpointTemplate, ExecutionSerializer, Middleware, MiddlewarePipeline, RawResponse,
        RequestDescriptor, RequestDescriptorBuilder, ResponseDecoder, StreamingResponse,
        Transport, UrlBuilder,
    };
    pub use crate::facade::ResultStream;
    pub use crate::streaming::{Frame, FrameEvent, FrameParser, FrameStream};
    pub use crate::types::{ClientConfig, ClientConfigBuilder, ParsingOptions};
    pub use crate::utils::cancel::{HandleState, RequestHandle};
    pub use reqwest::Method;
}
