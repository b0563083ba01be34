// ABOUTME: Line-buffering parser for the server-sent event stream returned by the completion API
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Upstream SSE Parser
//!
//! `bytes_stream()` chunks do not line up with SSE events: one chunk can carry
//! several `data:` lines, and a JSON payload can be split across two chunks.
//! [`SseLineBuffer`] accumulates bytes until a full line is available, and
//! [`create_sse_stream`] turns a raw byte stream into a [`ChatStream`] using a
//! provider-specific `parse_data` closure.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};
use promptsmith_core::constants::streaming::DONE_SENTINEL;
use promptsmith_core::errors::AppError;

use super::{ChatStream, StreamChunk};

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload (prefix stripped)
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Buffers incomplete lines between `feed` calls
///
/// Bytes are kept raw until a newline arrives: a chunk boundary may fall
/// inside a multi-byte UTF-8 sequence, but never inside a `\n` byte.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Parse whatever is left once the byte stream ends
    pub fn flush(&mut self) -> Option<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&remaining))
    }
}

/// Blank lines, comments and non-data fields (`event:`, `id:`, `retry:`) yield nothing
fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        None
    } else if data == DONE_SENTINEL {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(data.to_owned()))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

struct SseStreamState<F> {
    bytes: ByteStream,
    parser: SseLineBuffer,
    pending: VecDeque<Result<StreamChunk, AppError>>,
    parse_data: F,
    provider_name: &'static str,
    /// A `finish_reason` or `[DONE]` has been seen
    completed: bool,
    ended: bool,
}

impl<F> SseStreamState<F>
where
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>>,
{
    fn push_event(&mut self, event: SseEvent) {
        match event {
            SseEvent::Data(json) => match (self.parse_data)(&json) {
                Some(Ok(chunk)) => {
                    self.completed |= chunk.is_final;
                    self.pending.push_back(Ok(chunk));
                }
                Some(Err(e)) => {
                    self.ended = true;
                    self.pending.push_back(Err(e));
                }
                None => {}
            },
            SseEvent::Done => {
                self.completed = true;
                self.pending.push_back(Ok(StreamChunk::done()));
            }
        }
    }
}

/// Wrap a raw byte stream with SSE line buffering
///
/// `parse_data` returns `None` for payloads that carry no output (role-only
/// deltas, usage frames). Empty non-final deltas are filtered out. An error
/// from `parse_data` ends the stream, and so does a byte stream that closes
/// without a `finish_reason` or `[DONE]`.
pub fn create_sse_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    provider_name: &'static str,
) -> ChatStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<Result<StreamChunk, AppError>> + Send + 'static,
{
    let state = SseStreamState {
        bytes: Box::pin(byte_stream),
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        parse_data,
        provider_name,
        completed: false,
        ended: false,
    };

    let stream = unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.ended {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for event in state.parser.feed(&bytes) {
                        if state.ended {
                            break;
                        }
                        state.push_event(event);
                    }
                }
                Some(Err(e)) => {
                    state.ended = true;
                    let error = AppError::external_service(
                        state.provider_name,
                        format!("Stream read error: {e}"),
                    );
                    return Some((Err(error), state));
                }
                None => {
                    state.ended = true;
                    if let Some(event) = state.parser.flush() {
                        state.push_event(event);
                    }
                    if !state.completed && !state.pending.iter().any(Result::is_err) {
                        let error = AppError::external_service(
                            state.provider_name,
                            "Stream closed before the completion finished",
                        );
                        state.pending.push_back(Err(error));
                    }
                }
            }
        }
    });

    let filtered = stream.filter(|result| {
        future::ready(
            result
                .as_ref()
                .map_or(true, |chunk| !chunk.delta.is_empty() || chunk.is_final),
        )
    });

    Box::pin(filtered)
}
