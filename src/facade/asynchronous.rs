//! Async facade.
//!
//! Bridges the callback facade into a future with a oneshot channel. Dropping
//! the future before it resolves cancels the call.

use serde::de::DeserializeOwned;
use tokio::sync::oneshot;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::execution::http::RawResponse;
use crate::execution::request::RequestDescriptor;
use crate::utils::cancel::{CancelOnDrop, RequestHandle};

impl ApiClient {
    /// Execute a one-shot call and await its decoded result.
    pub async fn perform_async<T>(&self, request: RequestDescriptor) -> Result<T, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (_handle, call) = self.perform_cancellable(request);
        call.await
    }

    /// Start a one-shot call, returning its handle together with the future
    /// of its result. Cancelling through the handle resolves the future with
    /// `ClientError::Cancelled`.
    pub fn perform_cancellable<T>(
        &self,
        request: RequestDescriptor,
    ) -> (
        RequestHandle,
        impl Future<Output = Result<T, ClientError>> + Send + 'static + use<T>,
    )
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = self.perform(request, move |result| {
            let _ = tx.send(result);
        });
        (handle.clone(), await_completion(handle, rx))
    }

    /// Execute a one-shot call and await the undecoded response.
    pub async fn perform_raw_async(
        &self,
        request: RequestDescriptor,
    ) -> Result<RawResponse, ClientError> {
        let (tx, rx) = oneshot::channel();
        let handle = self.perform_raw(request, move |result| {
            let _ = tx.send(result);
        });
        await_completion(handle, rx).await
    }
}

/// The cancel-on-drop guard is armed before the first poll, so dropping an
/// unpolled future cancels too.
fn await_completion<R>(
    handle: RequestHandle,
    rx: oneshot::Receiver<Result<R, ClientError>>,
) -> impl Future<Output = Result<R, ClientError>> + Send + 'static
where
    R: Send + 'static,
{
    let mut guard = CancelOnDrop::new(handle.clone());
    async move {
        let outcome = rx.await;
        guard.disarm();
        match outcome {
            Ok(result) => result,
            // The completion was dropped without running: the call was
            // cancelled silently or its task never finished.
            Err(_) if handle.is_cancelled() => Err(ClientError::Cancelled),
            Err(_) => Err(ClientError::InternalError(
                "Call ended without delivering a result".to_string(),
            )),
        }
    }
}
