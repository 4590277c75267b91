//! Server-sent event decoding for streamed Messages API replies.
//!
//! Network chunks can split an event (or a UTF-8 sequence) anywhere, so the
//! decoder buffers raw bytes and only emits events terminated by a blank line.

use serde::Deserialize;

use super::LlmError;

/// One raw SSE event: the optional `event:` name and the joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feeds a network chunk and returns every event it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((end, sep_len)) = find_event_boundary(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + sep_len).collect();
            let text = String::from_utf8_lossy(&raw[..end]);
            if let Some(event) = parse_event(&text) {
                events.push(event);
            }
        }
        events
    }
}

/// Position of the first blank-line separator and its length.
fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_event(text: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
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
            _ => {}
        }
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }

    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Messages API stream events
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    Stop,
    Error(String),
    Ignored,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<DeltaPayload>,
    #[serde(default)]
    error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct DeltaPayload {
    #[serde(rename = "type", default)]
    delta_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

impl StreamEvent {
    pub fn parse(event: &SseEvent) -> Result<StreamEvent, LlmError> {
        let data = event.data.trim();
        if data.is_empty() {
            return Ok(StreamEvent::Ignored);
        }

        let payload: EventPayload = serde_json::from_str(data)?;
        let parsed = match payload.event_type.as_str() {
            "content_block_delta" => match payload.delta {
                Some(DeltaPayload {
                    delta_type: Some(kind),
                    text: Some(text),
                }) if kind == "text_delta" => StreamEvent::TextDelta(text),
                _ => StreamEvent::Ignored,
            },
            "message_stop" => StreamEvent::Stop,
            "error" => StreamEvent::Error(
                payload
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "unknown stream error".to_string()),
            ),
            _ => StreamEvent::Ignored,
        };
        Ok(parsed)
    }
}
