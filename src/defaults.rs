//! Default Configuration Values
//!
//! Centralizes the defaults used by `ClientConfig` and the transport.

use std::time::Duration;

/// Endpoint defaults for the API family this core targets.
pub mod endpoint {
    /// Default API host
    pub const HOST: &str = "api.openai.com";

    /// Default URL scheme
    pub const SCHEME: &str = "https";

    /// Default base path prepended to every endpoint template
    pub const BASE_PATH: &str = "/v1";
}

/// HTTP client default configurations
pub mod http {
    use super::*;

    /// Default request timeout for one-shot HTTP requests.
    ///
    /// Streaming requests only apply this to the handshake (until response
    /// headers arrive); the body may stay open for longer.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Default connection timeout for establishing HTTP connections
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default User-Agent string for HTTP requests
    pub const USER_AGENT: &str = concat!("siumai-exec/", env!("CARGO_PKG_VERSION"));

    /// Upper bound on error bodies read from a streaming response before
    /// they are turned into an `ApiError`.
    pub const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
}

/// Streaming defaults
pub mod streaming {
    /// Terminal marker sent as the last `data:` payload of a stream.
    pub const DONE_MARKER: &str = "[DONE]";

    /// Upper bound on one SSE frame (all of its lines). A server that never
    /// ends a line or a frame fails the stream instead of growing the buffer.
    pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

    /// Most frames handed to the serializer in one delivery job.
    pub const FRAME_BATCH: usize = 64;
}
