//! Execution core
//!
//! The one place where calls are actually executed. Every facade funnels into
//! [`ExecutionCore::execute`], [`ExecutionCore::execute_raw`] or
//! [`ExecutionCore::execute_stream`]; they differ only in how the result is
//! handed back to the caller.
//!
//! Network I/O runs as tokio tasks (on the ambient runtime, or on a runtime
//! owned by the core when built outside of one). Results are always delivered
//! through the [`ExecutionSerializer`].

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderValue};
use serde::de::DeserializeOwned;
use tokio::runtime::{Handle, Runtime};
use tracing::Instrument;

use crate::error::ClientError;
use crate::execution::decoder::ResponseDecoder;
use crate::execution::generate_request_id;
use crate::execution::http::{RawResponse, Transport};
use crate::execution::middleware::MiddlewarePipeline;
use crate::execution::request::RequestDescriptor;
use crate::execution::serializer::{ExecutionSerializer, Guard};
use crate::observability::format_headers_for_logging;
use crate::streaming::session::{StreamSinks, StreamingSession};
use crate::types::ClientConfig;
use crate::utils::cancel::RequestHandle;

/// Where I/O tasks are spawned.
pub(crate) struct IoRuntime {
    handle: Handle,
    owned: Option<Runtime>,
}

impl IoRuntime {
    /// Use the ambient runtime when there is one, otherwise start a private
    /// multi-threaded runtime.
    pub(crate) fn current_or_owned() -> Result<Self, ClientError> {
        if let Ok(handle) = Handle::try_current() {
            return Ok(Self::from_handle(handle));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("siumai-exec-io")
            .build()
            .map_err(|e| ClientError::InternalError(format!("Failed to start I/O runtime: {e}")))?;
        tracing::debug!("started private I/O runtime");
        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(runtime),
        })
    }

    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }
}

impl Drop for IoRuntime {
    fn drop(&mut self) {
        // Dropping a runtime from async context panics; shut down without blocking.
        if let Some(runtime) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}

/// Shared completion slot of a one-shot call. Fired at most once, either
/// by the I/O task's terminal job or by the cancellation report.
struct Completion<R> {
    slot: Mutex<Option<Box<dyn FnOnce(Result<R, ClientError>) + Send + 'static>>>,
}

impl<R> Completion<R> {
    fn new<F>(completion: F) -> Arc<Self>
    where
        F: FnOnce(Result<R, ClientError>) + Send + 'static,
    {
        Arc::new(Self {
            slot: Mutex::new(Some(Box::new(completion))),
        })
    }

    fn fire(&self, result: Result<R, ClientError>) {
        let completion = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(completion) = completion {
            completion(result);
        }
    }
}

/// Request-execution core shared by all facades of a client.
pub struct ExecutionCore {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    pipeline: MiddlewarePipeline,
    decoder: ResponseDecoder,
    serializer: ExecutionSerializer,
    runtime: IoRuntime,
}

impl ExecutionCore {
    pub(crate) fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        pipeline: MiddlewarePipeline,
        serializer: ExecutionSerializer,
        runtime: IoRuntime,
    ) -> Self {
        let decoder = ResponseDecoder::new(config.parsing_options);
        Self {
            config,
            transport,
            pipeline,
            decoder,
            serializer,
            runtime,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &MiddlewarePipeline {
        &self.pipeline
    }

    pub fn decoder(&self) -> ResponseDecoder {
        self.decoder
    }

    pub fn serializer(&self) -> &ExecutionSerializer {
        &self.serializer
    }

    /// Execute a one-shot call and decode the body as `T`.
    ///
    /// Returns immediately. `completion` runs exactly once on the serializer,
    /// unless the call is cancelled first (then it runs with
    /// `ClientError::Cancelled` if `cancellation_is_error` is set, or never).
    pub fn execute<T, F>(&self, request: RequestDescriptor, completion: F) -> RequestHandle
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T, ClientError>) + Send + 'static,
    {
        let decoder = self.decoder;
        self.spawn_one_shot(request, move |raw| decoder.decode::<T>(&raw), completion)
    }

    /// Execute a one-shot call and hand back the post-middleware response
    /// without decoding. Non-2xx statuses still yield an `ApiError`.
    pub fn execute_raw<F>(&self, request: RequestDescriptor, completion: F) -> RequestHandle
    where
        F: FnOnce(Result<RawResponse, ClientError>) + Send + 'static,
    {
        let decoder = self.decoder;
        self.spawn_one_shot(
            request,
            move |raw| {
                decoder.ensure_success(&raw)?;
                Ok(raw)
            },
            completion,
        )
    }

    /// Execute a streaming call.
    ///
    /// `on_frame` runs once per decoded frame in arrival order, `on_complete`
    /// exactly once after the last frame (unless cancelled first). Neither
    /// runs after the other has signalled the end of the stream.
    pub fn execute_stream<T, F, C>(
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
        let handle = RequestHandle::new(generate_request_id());
        let sinks = StreamSinks::new(on_frame, on_complete);

        if self.config.cancellation_is_error {
            let sinks = sinks.clone();
            let serializer = self.serializer.clone();
            handle.on_cancel(move || {
                serializer.submit(move || sinks.finish(Err(ClientError::Cancelled)))
            });
        }

        let mut request = request;
        if !request.headers().contains_key(ACCEPT) {
            request = request.with_header(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }
        let request = request.with_header(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let transport = self.transport.clone();
        let pipeline = self.pipeline.clone();
        let decoder = self.decoder;
        let serializer = self.serializer.clone();
        let done_marker = self.config.done_marker.clone();
        let task_handle = handle.clone();
        let span = tracing::debug_span!("stream", request_id = %handle.request_id());

        let task = async move {
            let token = task_handle.token();
            let request = pipeline.prepare(request);
            log_dispatch(task_handle.request_id(), &request, true);

            let opened = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(request_id = task_handle.request_id(), "stream cancelled before response head");
                    return;
                }
                opened = transport.open_stream(&request) => opened,
            };

            let session = StreamingSession::new(
                request,
                task_handle,
                pipeline,
                decoder,
                serializer,
                sinks,
                &done_marker,
            );
            match opened {
                Ok(response) => session.run(response).await,
                Err(e) => session.fail(e),
            }
        };
        self.runtime.handle.spawn(task.instrument(span));

        handle
    }

    fn spawn_one_shot<R, D, F>(
        &self,
        request: RequestDescriptor,
        decode: D,
        completion: F,
    ) -> RequestHandle
    where
        R: Send + 'static,
        D: FnOnce(RawResponse) -> Result<R, ClientError> + Send + 'static,
        F: FnOnce(Result<R, ClientError>) + Send + 'static,
    {
        let handle = RequestHandle::new(generate_request_id());
        let completion = Completion::new(completion);

        if self.config.cancellation_is_error {
            let completion = completion.clone();
            let serializer = self.serializer.clone();
            handle.on_cancel(move || {
                serializer.submit(move || completion.fire(Err(ClientError::Cancelled)))
            });
        }

        let transport = self.transport.clone();
        let pipeline = self.pipeline.clone();
        let serializer = self.serializer.clone();
        let task_handle = handle.clone();
        let span = tracing::debug_span!("request", request_id = %handle.request_id());

        let task = async move {
            let token = task_handle.token();
            let request = pipeline.prepare(request);
            log_dispatch(task_handle.request_id(), &request, false);
            let started = Instant::now();

            let sent = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(request_id = task_handle.request_id(), "request cancelled in flight");
                    return;
                }
                sent = transport.send(&request) => sent,
            };

            let result = sent.and_then(|response| {
                tracing::debug!(
                    request_id = task_handle.request_id(),
                    status = response.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "response received"
                );
                decode(pipeline.handle(&request, response))
            });
            if let Err(e) = &result {
                tracing::debug!(
                    request_id = task_handle.request_id(),
                    category = ?e.category(),
                    error = %e,
                    "request failed"
                );
            }

            serializer.submit_guarded(Guard::Complete(task_handle), move || completion.fire(result));
        };
        self.runtime.handle.spawn(task.instrument(span));

        handle
    }
}

fn log_dispatch(request_id: &str, request: &RequestDescriptor, streaming: bool) {
    tracing::debug!(
        request_id,
        method = %request.method(),
        url = %request.url(),
        streaming,
        "dispatching request"
    );
    tracing::trace!(
        request_id,
        headers = %format_headers_for_logging(request.headers()),
        "request headers"
    );
}

impl fmt::Debug for ExecutionCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCore")
            .field("host", &self.config.host)
            .field("pipeline", &self.pipeline)
            .field("serializer", &self.serializer)
            .field("owns_runtime", &self.runtime.owned.is_some())
            .finish_non_exhaustive()
    }
}
