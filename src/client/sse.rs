//! Server-Sent Events (SSE) parsing for streaming responses.
//!
//! [`SseParser`] is a push-style state machine: bytes in, complete
//! [`EventSourceMessage`]s out. It buffers bytes until a full line is
//! available, so lines (and multi-byte UTF-8 sequences) split across chunk
//! boundaries reassemble correctly.
//!
//! [`SseStream`] drives the parser over a response body and decodes each
//! message's `data` as JSON into the requested type. Events are routed by
//! name:
//!
//! - `end` closes the stream
//! - `error` yields a [`RemoteError::Server`] and closes the stream
//! - `metadata` is yielded like any other event, or skipped under
//!   [`MetadataEvents::Skip`]
//! - anything else with non-empty `data` is decoded and yielded
//!
//! Body EOF flushes a pending unterminated message and closes the stream.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_stream::try_stream;
use futures::stream::{Stream, StreamExt};
use serde::de::DeserializeOwned;

use super::transport::ByteStream;
use crate::error::{RemoteError, RemoteResult};

/// One dispatched SSE message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSourceMessage {
    /// Event name (`event:` field); empty for the default event.
    pub event: String,
    /// Payload (`data:` fields joined with `\n`).
    pub data: String,
    /// Last event ID (`id:` field).
    pub id: String,
    /// Reconnection time in milliseconds (`retry:` field).
    pub retry: Option<u64>,
}

impl EventSourceMessage {
    fn is_empty(&self) -> bool {
        self.event.is_empty() && self.data.is_empty() && self.id.is_empty() && self.retry.is_none()
    }
}

/// Incremental SSE parser.
///
/// Accepts `\n`, `\r\n` and lone `\r` line endings. A blank line dispatches
/// the message accumulated so far.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// The previous chunk ended in `\r`; a leading `\n` in the next chunk
    /// belongs to the same line ending.
    discard_leading_newline: bool,
    message: EventSourceMessage,
}

impl SseParser {
    /// Create a parser with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of body bytes; returns the messages it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> RemoteResult<Vec<EventSourceMessage>> {
        let mut chunk = chunk;
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        if self.discard_leading_newline {
            self.discard_leading_newline = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }
        self.buffer.extend_from_slice(chunk);

        let buffer = std::mem::take(&mut self.buffer);
        let mut messages = Vec::new();
        let mut line_start = 0;
        let mut pos = 0;
        while pos < buffer.len() {
            let byte = buffer[pos];
            if byte != b'\n' && byte != b'\r' {
                pos += 1;
                continue;
            }
            let line_end = pos;
            if byte == b'\r' {
                match buffer.get(pos + 1) {
                    Some(b'\n') => pos += 1,
                    Some(_) => {}
                    None => self.discard_leading_newline = true,
                }
            }
            if let Some(message) = self.process_line(&buffer[line_start..line_end])? {
                messages.push(message);
            }
            pos += 1;
            line_start = pos;
        }
        self.buffer = buffer[line_start..].to_vec();
        Ok(messages)
    }

    /// Signal end of body. An unterminated last line is processed and any
    /// pending message is returned.
    pub fn finish(&mut self) -> RemoteResult<Option<EventSourceMessage>> {
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            if let Some(message) = self.process_line(&rest)? {
                return Ok(Some(message));
            }
        }
        let pending = std::mem::take(&mut self.message);
        Ok((!pending.is_empty()).then_some(pending))
    }

    fn process_line(&mut self, line: &[u8]) -> RemoteResult<Option<EventSourceMessage>> {
        if line.is_empty() {
            let message = std::mem::take(&mut self.message);
            return Ok((!message.is_empty()).then_some(message));
        }

        let line = std::str::from_utf8(line)
            .map_err(|e| RemoteError::protocol(format!("invalid UTF-8 in event stream: {e}")))?;

        // Comment / keep-alive.
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.message.data.is_empty() {
                    self.message.data = value.to_string();
                } else {
                    self.message.data.push('\n');
                    self.message.data.push_str(value);
                }
            }
            "event" => self.message.event = value.to_string(),
            "id" => self.message.id = value.to_string(),
            "retry" => match value.parse::<u64>() {
                Ok(retry) => self.message.retry = Some(retry),
                Err(_) => tracing::warn!("ignoring invalid SSE retry value {value:?}"),
            },
            _ => {}
        }
        Ok(None)
    }
}

/// What an [`SseStream`] does with `metadata` events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetadataEvents {
    /// Decode and yield them like data events.
    #[default]
    Deliver,
    /// Drop them. For streams whose item type cannot hold run metadata.
    Skip,
}

enum Routed<T> {
    Item(T),
    Skip,
    End,
}

fn route<T: DeserializeOwned>(
    message: EventSourceMessage,
    metadata: MetadataEvents,
) -> RemoteResult<Routed<T>> {
    match message.event.as_str() {
        "end" => Ok(Routed::End),
        "error" => Err(server_error(&message.data)),
        "metadata" if metadata == MetadataEvents::Skip => {
            tracing::debug!("skipping SSE metadata event: {}", message.data);
            Ok(Routed::Skip)
        }
        _ if message.data.is_empty() => Ok(Routed::Skip),
        _ => serde_json::from_str(&message.data)
            .map(Routed::Item)
            .map_err(|e| {
                RemoteError::InvalidJson(format!(
                    "failed to decode SSE event data: {e} (data: {})",
                    message.data
                ))
            }),
    }
}

/// Build the error for an `error` event. The payload is usually
/// `{"status_code": ..., "message": ...}` but may be free text.
fn server_error(data: &str) -> RemoteError {
    let parsed = serde_json::from_str::<serde_json::Value>(data).ok();
    let status = parsed
        .as_ref()
        .and_then(|v| v.get("status_code"))
        .and_then(|s| s.as_u64())
        .and_then(|s| u16::try_from(s).ok())
        .unwrap_or(500);
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            if data.is_empty() {
                "Unspecified event streaming error.".to_string()
            } else {
                data.to_string()
            }
        });
    RemoteError::Server { status, message }
}

fn decode_events<T>(
    mut body: ByteStream,
    metadata: MetadataEvents,
) -> impl Stream<Item = RemoteResult<T>> + Send
where
    T: DeserializeOwned + Send + 'static,
{
    try_stream! {
        let mut parser = SseParser::new();
        let mut done = false;
        while !done {
            let messages = match body.next().await {
                Some(chunk) => parser.feed(&chunk?)?,
                None => {
                    tracing::debug!("event stream body ended");
                    done = true;
                    parser.finish()?.into_iter().collect()
                }
            };
            for message in messages {
                match route::<T>(message, metadata)? {
                    Routed::Item(item) => yield item,
                    Routed::Skip => {}
                    Routed::End => {
                        tracing::debug!("event stream closed by end event");
                        done = true;
                        break;
                    }
                }
            }
        }
    }
}

/// A single-consumer, pull-based stream of decoded SSE events.
///
/// Nothing is read from the network until the next item is requested, so a
/// slow consumer applies backpressure all the way to the socket. Dropping the
/// stream drops the response body and closes the connection.
///
/// # Example
///
/// ```no_run
/// # async fn example(mut stream: remote_runnable::client::SseStream<remote_runnable::Revived>) {
/// while let Some(chunk) = stream.next().await {
///     match chunk {
///         Ok(chunk) => println!("chunk: {:?}", chunk),
///         Err(e) => eprintln!("stream error: {}", e),
///     }
/// }
/// # }
/// ```
pub struct SseStream<T> {
    inner: Pin<Box<dyn Stream<Item = RemoteResult<T>> + Send>>,
}

impl<T> fmt::Debug for SseStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseStream").finish_non_exhaustive()
    }
}

impl<T> SseStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Parse `body` as an event stream, decoding each message's data as `T`.
    ///
    /// Every event with data is yielded, `metadata` events included.
    pub fn from_body(body: ByteStream) -> Self {
        Self::with_metadata_events(body, MetadataEvents::Deliver)
    }

    /// Like [`SseStream::from_body`], choosing what happens to `metadata` events.
    pub fn with_metadata_events(body: ByteStream, metadata: MetadataEvents) -> Self {
        Self {
            inner: Box::pin(decode_events(body, metadata)),
        }
    }

    /// Get the next event.
    ///
    /// Returns `None` once the stream has ended (end event, body EOF, or
    /// after an error has been returned).
    pub async fn next(&mut self) -> Option<RemoteResult<T>> {
        self.inner.next().await
    }

    /// Drain the stream, stopping at the first error.
    pub async fn try_collect(mut self) -> RemoteResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

impl<T> Stream for SseStream<T> {
    type Item = RemoteResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
