//! # SSE Framing
//!
//! Server-Sent Events parser for the notification stream.
//!
//! Unlike a data-only parser, the notification channel names each event with
//! an `event:` line, so frames are assembled field by field and dispatched on
//! the blank line that terminates them:
//! - Line buffering from chunked responses (split lines, `\r\n` tolerated)
//! - `event:` and `data:` fields (multiple `data:` lines joined with `\n`)
//! - Comments (`:`) and `id:`/`retry:` fields ignored
//! - A trailing frame without its blank line is flushed at end of stream

use bytes::{Bytes, BytesMut};
use futures::Stream;
use genie_core::events::Notification;
use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// One dispatched SSE frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the last `event:` field, if any.
    pub event: Option<String>,
    /// Joined `data:` fields.
    pub data: String,
}

/// Frame under construction.
#[derive(Default)]
struct FrameBuilder {
    event: Option<String>,
    data: Vec<String>,
}

impl FrameBuilder {
    /// Feed one line (without its terminator). Returns a frame on a blank line.
    fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.trim().is_empty() {
            return self.take_frame();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.trim().to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    /// Dispatch the pending frame. Frames without data are keep-alives.
    fn take_frame(&mut self) -> Option<SseFrame> {
        let event = self.event.take().filter(|e| !e.is_empty());
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

struct ParserState<S> {
    stream: S,
    buffer: BytesMut,
    frame: FrameBuilder,
    done: bool,
}

/// Parse SSE frames from a byte stream.
///
/// The stream ends when the body ends or on the first read error (logged).
pub fn parse_sse_frames<S, E>(byte_stream: S) -> impl Stream<Item = SseFrame> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let initial = ParserState {
        stream: byte_stream,
        buffer: BytesMut::with_capacity(8192),
        frame: FrameBuilder::default(),
        done: false,
    };

    futures::stream::unfold(initial, |mut state| async move {
        if state.done {
            return None;
        }

        loop {
            if let Some(newline_pos) = state.buffer.iter().position(|&b| b == b'\n') {
                let mut line_bytes = state.buffer.split_to(newline_pos + 1);
                line_bytes.truncate(line_bytes.len() - 1);
                if line_bytes.last() == Some(&b'\r') {
                    line_bytes.truncate(line_bytes.len() - 1);
                }

                let Ok(line) = std::str::from_utf8(&line_bytes) else {
                    debug!("skipping non-UTF-8 SSE line");
                    continue;
                };
                if let Some(frame) = state.frame.feed_line(line) {
                    return Some((frame, state));
                }
                continue;
            }

            match state.stream.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    warn!("notification stream read error: {e}");
                    return None;
                }
                None => {
                    state.done = true;
                    let rest = state.buffer.split();
                    if let Ok(line) = std::str::from_utf8(&rest) {
                        let _ = state.frame.feed_line(line.trim_end_matches('\r'));
                    }
                    return state.frame.take_frame().map(|frame| (frame, state));
                }
            }
        }
    })
}

/// Turn a frame into a [`Notification`].
///
/// A named frame carries its payload as `data`; data that is empty or not
/// JSON becomes a null payload so the event itself still reaches the
/// tracker. An unnamed frame (or one named `message`) must carry a
/// `{ "type": ..., "payload": ... }` envelope and is dropped when it does not.
pub fn frame_to_notification(frame: &SseFrame) -> Option<Notification> {
    match frame.event.as_deref() {
        None | Some("message") => match serde_json::from_str::<Notification>(&frame.data) {
            Ok(notification) => Some(notification),
            Err(e) => {
                warn!(error = %e, "malformed notification envelope, dropping frame");
                None
            }
        },
        Some(name) => {
            let payload = if frame.data.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str::<Value>(&frame.data).unwrap_or_else(|e| {
                    warn!(event_type = name, error = %e, "malformed frame data, using empty payload");
                    Value::Null
                })
            };
            Some(Notification::new(name, payload))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
