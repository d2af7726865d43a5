//! Incremental decoder for the chat server's `event:`/`data:` stream.

use serde_json::Value;

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Connected,
    Delta {
        run_id: Option<String>,
        message: Option<Value>,
    },
    Final {
        message: Option<Value>,
    },
    Error {
        message: Option<String>,
    },
    Aborted,
}

impl ChatEvent {
    /// Build an event from its type and JSON payload. Unknown types yield `None`.
    pub fn from_parts(event_type: &str, data: Value) -> Option<Self> {
        let event = match event_type {
            "connected" => Self::Connected,
            "delta" => Self::Delta {
                run_id: data.get("runId").and_then(Value::as_str).map(str::to_string),
                message: data.get("message").cloned(),
            },
            "final" => Self::Final {
                message: data.get("message").cloned(),
            },
            "error" => Self::Error {
                message: data
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
            },
            "aborted" => Self::Aborted,
            _ => return None,
        };
        Some(event)
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Final { .. } | Self::Error { .. } | Self::Aborted)
    }
}

/// Longest line the decoder will hold while waiting for its `\n`.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Buffers raw bytes and yields events as complete lines arrive.
///
/// Only `\n`-terminated lines are processed; a trailing partial line waits
/// for the next chunk. A `data:` line dispatches the most recent `event:`
/// type; malformed JSON and unknown types are dropped. A partial line longer
/// than the limit is discarded up to its terminating `\n`.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for `\n`.
    scanned: usize,
    max_line: usize,
    discarding: bool,
    pending_type: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            discarding: false,
            pending_type: None,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChatEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            if self.discarding {
                self.discarding = false;
            } else {
                decode_line(&mut self.pending_type, &self.buffer[start..end], &mut events);
            }
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line {
            tracing::warn!(bytes = self.buffer.len(), "dropping oversized stream line");
            self.buffer.clear();
            self.scanned = 0;
            self.discarding = true;
        }

        events
    }

    /// Bytes received that do not yet form a complete line.
    #[cfg(test)]
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(pending_type: &mut Option<String>, raw: &[u8], events: &mut Vec<ChatEvent>) {
    let line = String::from_utf8_lossy(raw);
    let line = line.strip_suffix('\r').unwrap_or(&line);

    if let Some(event_type) = line.strip_prefix("event:") {
        *pending_type = Some(event_type.trim().to_string());
    } else if let Some(data) = line.strip_prefix("data:")
        && let Some(event_type) = pending_type.take()
    {
        match serde_json::from_str::<Value>(data.trim_start()) {
            Ok(value) => {
                if let Some(event) = ChatEvent::from_parts(&event_type, value) {
                    events.push(event);
                } else {
                    tracing::trace!(event_type, "ignoring unknown event");
                }
            }
            Err(e) => tracing::debug!(event_type, error = %e, "ignoring malformed event data"),
        }
    }
}
