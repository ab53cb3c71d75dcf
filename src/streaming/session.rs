//! Streaming session
//!
//! Drives one streaming call after the response head arrived: reads body
//! chunks, frames them, runs frame middleware, decodes and hands the results
//! to the execution serializer. Exactly one terminal delivery is made unless
//! the caller cancelled first.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::de::DeserializeOwned;

use crate::defaults;
use crate::error::ClientError;
use crate::execution::decoder::ResponseDecoder;
use crate::execution::http::{ByteStream, RawResponse, StreamingResponse};
use crate::execution::middleware::MiddlewarePipeline;
use crate::execution::request::RequestDescriptor;
use crate::execution::serializer::{ExecutionSerializer, Guard};
use crate::streaming::{FrameEvent, FrameParser};
use crate::types::ParsingOptions;
use crate::utils::cancel::RequestHandle;

type FrameSink<T> = Box<dyn FnMut(Result<T, ClientError>) + Send + 'static>;
type CompletionSink = Box<dyn FnOnce(Result<(), ClientError>) + Send + 'static>;

/// Caller callbacks of one streaming call.
///
/// Only ever invoked from the serializer thread. `finish` drops the frame
/// callback so nothing reaches it after the terminal event.
pub(crate) struct StreamSinks<T> {
    frames: Mutex<Option<FrameSink<T>>>,
    completion: Mutex<Option<CompletionSink>>,
}

impl<T> StreamSinks<T> {
    pub(crate) fn new<F, C>(on_frame: F, on_complete: C) -> Arc<Self>
    where
        F: FnMut(Result<T, ClientError>) + Send + 'static,
        C: FnOnce(Result<(), ClientError>) + Send + 'static,
    {
        Arc::new(Self {
            frames: Mutex::new(Some(Box::new(on_frame))),
            completion: Mutex::new(Some(Box::new(on_complete))),
        })
    }

    fn deliver(&self, item: Result<T, ClientError>) {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(on_frame) = frames.as_mut() {
            on_frame(item);
        }
    }

    pub(crate) fn finish(&self, result: Result<(), ClientError>) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let completion = self
            .completion
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(on_complete) = completion {
            on_complete(result);
        }
    }
}

pub(crate) struct StreamingSession<T> {
    request: RequestDescriptor,
    handle: RequestHandle,
    pipeline: MiddlewarePipeline,
    decoder: ResponseDecoder,
    serializer: ExecutionSerializer,
    sinks: Arc<StreamSinks<T>>,
    parser: FrameParser,
    status: u16,
    frames_seen: usize,
}

impl<T> StreamingSession<T>
where
    T: DeserializeOwned + Send + 'static,
{
    pub(crate) fn new(
        request: RequestDescriptor,
        handle: RequestHandle,
        pipeline: MiddlewarePipeline,
        decoder: ResponseDecoder,
        serializer: ExecutionSerializer,
        sinks: Arc<StreamSinks<T>>,
        done_marker: &str,
    ) -> Self {
        Self {
            request,
            handle,
            pipeline,
            decoder,
            serializer,
            sinks,
            parser: FrameParser::new(done_marker),
            status: 0,
            frames_seen: 0,
        }
    }

    /// Report a failure that happened before a response head was available.
    pub(crate) fn fail(self, error: ClientError) {
        tracing::debug!(
            request_id = self.handle.request_id(),
            error = %error,
            "stream failed to open"
        );
        self.terminate(Err(error));
    }

    /// Consume the response until a terminal condition. Returning drops the
    /// body, which closes the connection.
    pub(crate) async fn run(mut self, response: StreamingResponse) {
        self.status = response.status;
        tracing::debug!(
            request_id = self.handle.request_id(),
            status = response.status,
            content_type = response.content_type().unwrap_or(""),
            "stream opened"
        );

        if !response.is_success() {
            let StreamingResponse {
                status,
                headers,
                body,
            } = response;
            // Non-2xx is an API error even when the error body cannot be read.
            let body = match self.collect_body(body).await {
                None => return,
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    tracing::debug!(
                        request_id = self.handle.request_id(),
                        status,
                        error = %e,
                        "error body unreadable; reporting status only"
                    );
                    Bytes::new()
                }
            };
            let raw = self.pipeline.handle(
                &self.request,
                RawResponse {
                    status,
                    headers,
                    body,
                },
            );
            return self.finish_single_body(raw);
        }

        if is_plain_json(&response) {
            let StreamingResponse {
                status,
                headers,
                body,
            } = response;
            match self.collect_body(body).await {
                None => {}
                Some(Err(e)) => self.terminate(Err(e)),
                Some(Ok(body)) => {
                    let raw = self.pipeline.handle(
                        &self.request,
                        RawResponse {
                            status,
                            headers,
                            body,
                        },
                    );
                    self.finish_single_body(raw);
                }
            }
            return;
        }

        let token = self.handle.token();
        let mut frames = self
            .parser
            .clone()
            .parse(response.body)
            .ready_chunks(defaults::streaming::FRAME_BATCH);
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(request_id = self.handle.request_id(), "stream cancelled");
                    return;
                }
                next = frames.next() => next,
            };

            match next {
                Some(events) => {
                    if self.on_frames(events).is_break() {
                        return;
                    }
                }
                None => {
                    tracing::warn!(
                        request_id = self.handle.request_id(),
                        frames = self.frames_seen,
                        "connection closed before terminal marker"
                    );
                    self.terminate(Err(ClientError::StreamError(
                        "Connection closed before the stream terminal marker".to_string(),
                    )));
                    return;
                }
            }
        }
    }

    /// Process the frames that were ready together. They go to the
    /// serializer as one batch, followed by the terminal event if one of
    /// them ended the stream.
    fn on_frames(&mut self, events: Vec<Result<FrameEvent, ClientError>>) -> ControlFlow<()> {
        let skip_malformed = self
            .decoder
            .options()
            .contains(ParsingOptions::SKIP_MALFORMED_FRAMES);
        let mut batch = Vec::new();
        let mut terminal = None;

        for event in events {
            let frame = match event {
                Ok(FrameEvent::Frame(frame)) => frame,
                Ok(FrameEvent::Done) => {
                    tracing::debug!(
                        request_id = self.handle.request_id(),
                        frames = self.frames_seen,
                        "stream completed"
                    );
                    terminal = Some(Ok(()));
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = self.handle.request_id(),
                        error = %e,
                        "stream body failed"
                    );
                    terminal = Some(Err(e));
                    break;
                }
            };

            let frame = self.pipeline.handle_frame(&self.request, frame);
            if frame.data.trim().is_empty() {
                continue;
            }
            self.frames_seen += 1;
            tracing::trace!(
                request_id = self.handle.request_id(),
                event = frame.event.as_deref().unwrap_or("message"),
                bytes = frame.data.len(),
                "frame"
            );

            match self.decoder.decode_frame::<T>(self.status, &frame) {
                Ok(value) => batch.push(Ok(value)),
                Err(e @ ClientError::ApiError { .. }) => {
                    terminal = Some(Err(e));
                    break;
                }
                Err(e) if skip_malformed => {
                    tracing::warn!(
                        request_id = self.handle.request_id(),
                        error = %e,
                        "skipping malformed frame"
                    );
                    batch.push(Err(e));
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = self.handle.request_id(),
                        error = %e,
                        "malformed frame ends the stream"
                    );
                    terminal = Some(Err(e));
                    break;
                }
            }
        }

        if !batch.is_empty() {
            self.deliver(batch);
        }
        match terminal {
            Some(result) => {
                self.terminate(result);
                ControlFlow::Break(())
            }
            None => ControlFlow::Continue(()),
        }
    }

    /// Handle a whole (non-SSE or error) body that already went through
    /// response middleware.
    fn finish_single_body(&self, raw: RawResponse) {
        if let Err(e) = self.decoder.ensure_success(&raw) {
            tracing::debug!(
                request_id = self.handle.request_id(),
                status = raw.status,
                "stream rejected by server"
            );
            return self.terminate(Err(e));
        }
        if let Some(api) = ResponseDecoder::api_error_in(raw.status, &raw.body) {
            return self.terminate(Err(api));
        }
        match self.decoder.decode::<T>(&raw) {
            Ok(value) => {
                self.deliver(vec![Ok(value)]);
                self.terminate(Ok(()));
            }
            Err(e) => self.terminate(Err(e)),
        }
    }

    /// Read a whole body, capped at `MAX_ERROR_BODY_BYTES`. `None` means the
    /// call was cancelled meanwhile.
    async fn collect_body(&self, mut body: ByteStream) -> Option<Result<Bytes, ClientError>> {
        let token = self.handle.token();
        let mut buf = BytesMut::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                next = body.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    let room = defaults::http::MAX_ERROR_BODY_BYTES.saturating_sub(buf.len());
                    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                    if buf.len() >= defaults::http::MAX_ERROR_BODY_BYTES {
                        break;
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }
        Some(Ok(buf.freeze()))
    }

    /// One serializer job per batch; the handle is re-checked before every
    /// item so a cancel between two frames stops delivery immediately.
    fn deliver(&self, batch: Vec<Result<T, ClientError>>) {
        let sinks = self.sinks.clone();
        let handle = self.handle.clone();
        self.serializer
            .submit_guarded(Guard::WhileActive(self.handle.clone()), move || {
                for item in batch {
                    if !handle.is_active() {
                        break;
                    }
                    sinks.deliver(item);
                }
            });
    }

    fn terminate(&self, result: Result<(), ClientError>) {
        let sinks = self.sinks.clone();
        self.serializer
            .submit_guarded(Guard::Complete(self.handle.clone()), move || {
                sinks.finish(result)
            });
    }
}

/// 2xx bodies labelled `application/json` (or a `+json` type) are not
/// event streams; anything else, including a missing content type or
/// line-delimited JSON, is parsed as SSE.
fn is_plain_json(response: &StreamingResponse) -> bool {
    if response.is_event_stream() {
        return false;
    }
    let Some(content_type) = response.content_type() else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
