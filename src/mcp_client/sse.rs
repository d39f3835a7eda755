//! Server-Sent Events parser for the MCP SSE transport.
//!
//! Reads a `reqwest::Response` as a byte stream, splits on blank-line event
//! boundaries, and yields one `SseEvent` per complete event. Bytes are
//! buffered raw so multi-byte UTF-8 sequences split across network chunks
//! decode correctly.

use futures::stream::{self, Stream, StreamExt};

use super::errors::McpError;

/// A single decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type; `"message"` when the event carried no `event:` field.
    pub event: String,
    /// Data lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

/// Parse one event block (the text between two blank lines).
///
/// Returns `None` for keep-alives and comment-only blocks.
pub fn parse_event(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut id = None;

    for line in block.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => id = Some(value.to_string()),
            _ => {} // retry and unknown fields
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data_lines.join("\n"),
        id,
    })
}

/// Incremental splitter: feed raw bytes, collect complete events.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete event it closes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = find_boundary(&self.buffer) {
            let block: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&block[..end]);
            if let Some(event) = parse_event(&text) {
                events.push(event);
            }
        }
        events
    }

    /// Flush whatever is left when the stream ends without a trailing blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest);
        if text.trim().is_empty() {
            return None;
        }
        parse_event(&text)
    }
}

fn find_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Turn an open SSE response into a stream of events.
pub fn sse_events(
    response: reqwest::Response,
    endpoint: String,
) -> impl Stream<Item = Result<SseEvent, McpError>> {
    let byte_stream = response.bytes_stream();

    stream::unfold(
        (byte_stream, SseBuffer::new(), std::collections::VecDeque::new(), false),
        move |(mut byte_stream, mut buffer, mut ready, mut done)| {
            let endpoint = endpoint.clone();
            async move {
                loop {
                    if let Some(event) = ready.pop_front() {
                        return Some((Ok(event), (byte_stream, buffer, ready, done)));
                    }
                    if done {
                        return None;
                    }

                    match byte_stream.next().await {
                        Some(Ok(bytes)) => ready.extend(buffer.push(&bytes)),
                        Some(Err(e)) => {
                            done = true;
                            return Some((
                                Err(McpError::TransportError {
                                    endpoint,
                                    reason: format!("SSE read error: {e}"),
                                }),
                                (byte_stream, buffer, ready, done),
                            ));
                        }
                        None => {
                            done = true;
                            ready.extend(buffer.finish());
                        }
                    }
                }
            }
        },
    )
}
