//! Callback facade.

use serde::de::DeserializeOwned;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::execution::http::RawResponse;
use crate::execution::request::RequestDescriptor;
use crate::utils::cancel::RequestHandle;

impl ApiClient {
    /// Execute a one-shot call; `completion` runs once on the serializer.
    ///
    /// Never blocks the calling thread.
    pub fn perform<T, F>(&self, request: RequestDescriptor, completion: F) -> RequestHandle
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T, ClientError>) + Send + 'static,
    {
        self.core().execute(request, completion)
    }

    /// Like [`perform`](Self::perform) but hands back the undecoded response.
    pub fn perform_raw<F>(&self, request: RequestDescriptor, completion: F) -> RequestHandle
    where
        F: FnOnce(Result<RawResponse, ClientError>) + Send + 'static,
    {
        self.core().execute_raw(request, completion)
    }
}
