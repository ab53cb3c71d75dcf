//! SSE frame parser
//!
//! Event framing is done by `eventsource-stream`. In front of it sits a
//! [`LineBuffer`] that only forwards complete lines: a long line is scanned
//! once however finely it is chunked, pending bytes are bounded, and a
//! multi-byte UTF-8 sequence is never split. Invalid UTF-8 is replaced with
//! U+FFFD, so such a frame fails to decode like any other malformed frame
//! and the result does not depend on where the transport cut the bytes.

use std::pin::Pin;

use bytes::BytesMut;
use eventsource_stream::{Event, EventStream};
use futures::{Stream, StreamExt};

use crate::defaults;
use crate::error::ClientError;
use crate::execution::http::ByteStream;

/// One discrete event of a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// `event:` field; `None` for the default `message` type
    pub event: Option<String>,
    /// `id:` field, if the server sent one
    pub id: Option<String>,
    /// `data:` payload; multiple data lines are joined with `\n`
    pub data: String,
}

impl Frame {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }
}

impl From<Event> for Frame {
    fn from(event: Event) -> Self {
        Self {
            event: (!event.event.is_empty() && event.event != "message").then_some(event.event),
            id: (!event.id.is_empty()).then_some(event.id),
            data: event.data,
        }
    }
}

/// Item of a [`FrameStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Frame(Frame),
    /// The terminal marker was received; the stream ended cleanly.
    Done,
}

/// Frames of one response body. Ends after `Done` or the first error.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<FrameEvent, ClientError>> + Send>>;

/// Turns a response body into a [`FrameStream`].
#[derive(Debug, Clone)]
pub struct FrameParser {
    done_marker: String,
    max_frame_bytes: usize,
}

impl FrameParser {
    pub fn new(done_marker: impl Into<String>) -> Self {
        Self {
            done_marker: done_marker.into(),
            max_frame_bytes: defaults::streaming::MAX_FRAME_BYTES,
        }
    }

    /// Largest frame (all of its lines, without terminators) accepted before
    /// the stream fails with `StreamError`.
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn done_marker(&self) -> &str {
        &self.done_marker
    }

    /// Parse `body`. The terminal marker is compared against the trimmed
    /// frame data; nothing after it is read.
    pub fn parse(self, body: ByteStream) -> FrameStream {
        let Self {
            done_marker,
            max_frame_bytes,
        } = self;
        let lines = Box::pin(complete_lines(body, max_frame_bytes));

        let out = async_stream::stream! {
            let mut events = EventStream::new(lines);
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        if event.data.is_empty() {
                            continue;
                        }
                        if event.data.trim() == done_marker {
                            yield Ok(FrameEvent::Done);
                            return;
                        }
                        yield Ok(FrameEvent::Frame(Frame::from(event)));
                    }
                    Err(eventsource_stream::EventStreamError::Transport(e)) => {
                        yield Err(e);
                        return;
                    }
                    Err(e) => {
                        yield Err(ClientError::StreamError(format!("SSE stream error: {e}")));
                        return;
                    }
                }
            }
        };
        Box::pin(out)
    }
}

fn complete_lines(
    mut body: ByteStream,
    max_frame_bytes: usize,
) -> impl Stream<Item = Result<String, ClientError>> + Send {
    async_stream::stream! {
        let mut lines = LineBuffer::new(max_frame_bytes);
        while let Some(chunk) = body.next().await {
            match chunk.and_then(|chunk| lines.push(&chunk)) {
                Ok(Some(text)) => yield Ok(text),
                Ok(None) => {}
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        if let Some(rest) = lines.finish() {
            yield Ok(rest);
        }
    }
}

/// Holds back the unterminated tail of a byte stream.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    pending: BytesMut,
    max_frame_bytes: usize,
    frame_bytes: usize,
    at_line_start: bool,
    after_cr: bool,
}

impl LineBuffer {
    pub(crate) fn new(max_frame_bytes: usize) -> Self {
        Self {
            pending: BytesMut::new(),
            max_frame_bytes,
            frame_bytes: 0,
            at_line_start: true,
            after_cr: false,
        }
    }

    /// Feed one chunk and return the text of every line it completes.
    ///
    /// A trailing `\r` is held back until the next byte shows whether it
    /// starts a `\r\n` pair.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<Option<String>, ClientError> {
        let offset = self.pending.len();
        self.pending.extend_from_slice(chunk);

        let mut cut = None;
        let mut previous_cut = None;
        for (i, &byte) in chunk.iter().enumerate() {
            match byte {
                b'\n' if self.after_cr => self.after_cr = false,
                b'\n' | b'\r' => {
                    // A terminator right after another one is a blank line.
                    if self.at_line_start {
                        self.frame_bytes = 0;
                    }
                    self.at_line_start = true;
                    self.after_cr = byte == b'\r';
                }
                _ => {
                    self.at_line_start = false;
                    self.after_cr = false;
                    self.frame_bytes += 1;
                    if self.frame_bytes > self.max_frame_bytes {
                        return Err(ClientError::StreamError(format!(
                            "Stream frame exceeds {} bytes",
                            self.max_frame_bytes
                        )));
                    }
                    continue;
                }
            }
            previous_cut = cut;
            cut = Some(offset + i + 1);
        }

        if cut == Some(self.pending.len()) && self.pending.last() == Some(&b'\r') {
            cut = previous_cut;
        }
        Ok(cut.map(|cut| lossy(self.pending.split_to(cut))))
    }

    /// Whatever is left once the body ended.
    pub(crate) fn finish(&mut self) -> Option<String> {
        (!self.pending.is_empty()).then(|| lossy(self.pending.split()))
    }
}

fn lossy(bytes: BytesMut) -> String {
    String::from_utf8_lossy(&bytes).into_owned()
}
