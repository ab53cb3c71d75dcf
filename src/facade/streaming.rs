//! Streaming callback facade.

use serde::de::DeserializeOwned;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::execution::request::RequestDescriptor;
use crate::utils::cancel::RequestHandle;

impl ApiClient {
    /// Execute a streaming call.
    ///
    /// `on_frame` receives decoded frames in arrival order (a per-frame `Err`
    /// only with `ParsingOptions::SKIP_MALFORMED_FRAMES`); `on_complete`
    /// fires once after the last frame with `Ok(())` on the terminal marker
    /// or the error that ended the stream. Nothing is delivered after a
    /// successful `cancel()`.
    pub fn perform_streaming<T, F, C>(
        &self,
        request: RequestDescriptor,
        on_frame: F,
        on_complete: C,
    ) -> RequestHandle
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(Result<T, ClientError>) + Send + 'static,
        C: FnOnce(Result<(), ClientError>) + Send + 'static,
    {
        self.core().execute_stream(request, on_frame, on_complete)
    }
}
