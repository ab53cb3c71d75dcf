//! Reactive facade.
//!
//! Results are emitted as items of a [`futures::Stream`]. The stream ends
//! after the terminal event; dropping it cancels the call.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;

use crate::client::ApiClient;
use crate::error::ClientError;
use crate::execution::request::RequestDescriptor;
use crate::utils::cancel::RequestHandle;

/// Stream of call results.
///
/// - one-shot (`observe`): exactly one item, then end;
/// - streaming (`observe_stream`): one `Ok` item per frame, then end on clean
///   completion, or a final `Err` item and end on a terminal error.
///
/// With `ParsingOptions::SKIP_MALFORMED_FRAMES` a malformed frame shows up as
/// an `Err` item that is followed by further items.
pub struct ResultStream<T> {
    rx: mpsc::UnboundedReceiver<Result<T, ClientError>>,
    handle: RequestHandle,
    done: bool,
}

impl<T> Unpin for ResultStream<T> {}

impl<T> ResultStream<T> {
    fn new(rx: mpsc::UnboundedReceiver<Result<T, ClientError>>, handle: RequestHandle) -> Self {
        Self {
            rx,
            handle,
            done: false,
        }
    }

    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }

    /// Cancel the underlying call; the stream then ends without further items
    /// (or with `Err(Cancelled)` when `cancellation_is_error` is set).
    pub fn cancel(&self) -> bool {
        self.handle.cancel()
    }
}

impl<T> Stream for ResultStream<T> {
    type Item = Result<T, ClientError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<T> Drop for ResultStream<T> {
    fn drop(&mut self) {
        if !self.done {
            self.handle.cancel();
        }
    }
}

impl<T> std::fmt::Debug for ResultStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("handle", &self.handle)
            .field("done", &self.done)
            .finish()
    }
}

impl ApiClient {
    /// One-shot call as a single-item stream.
    pub fn observe<T>(&self, request: RequestDescriptor) -> ResultStream<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.perform(request, move |result| {
            let _ = tx.send(result);
        });
        ResultStream::new(rx, handle)
    }

    /// Streaming call as a stream of decoded frames.
    pub fn observe_stream<T>(&self, request: RequestDescriptor) -> ResultStream<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let frames = tx.clone();
        let handle = self.perform_streaming(
            request,
            move |item| {
                let _ = frames.send(item);
            },
            move |result: Result<(), ClientError>| {
                if let Err(e) = result {
                    let _ = tx.send(Err(e));
                }
            },
        );
        ResultStream::new(rx, handle)
    }
}
