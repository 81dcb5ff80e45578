//! Server-sent-event stream reading.
//!
//! [`HttpEventSource`] splits the response body into raw `event`/`data`
//! frames. [`SseStreamReader`] owns a source and turns frames into
//! [`ServerEvent`]s, skipping frames it cannot decode.

use std::future::Future;

use thiserror::Error;

use crate::events::{ServerEvent, decode_event};

/// Sanity cap on a single undelimited event.
const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SseError {
    #[error("SSE buffer exceeded maximum size (4 MiB)")]
    BufferOverflow,
    #[error("event stream failed: {0}")]
    Transport(#[source] reqwest::Error),
}

/// One undecoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event_type: String,
    pub data: String,
}

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a <= b { (a, 2) } else { (b, 4) }),
        (Some(a), None) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

fn drain_next_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_event_boundary(buffer)?;
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(event)
}

/// Parse the `event:`/`data:` fields of one frame. Frames without data are
/// keep-alives and yield `None`.
fn parse_raw_event(event: &str) -> Option<RawEvent> {
    let mut event_type = None;
    let mut data = String::new();
    let mut has_data = false;

    for line in event.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event_type = Some(value.to_string()),
            "data" => {
                if has_data {
                    data.push('\n');
                }
                data.push_str(value);
                has_data = true;
            }
            _ => {}
        }
    }

    has_data.then(|| RawEvent {
        event_type: event_type.unwrap_or_else(|| "message".to_string()),
        data,
    })
}

/// Something that yields raw frames until it closes.
pub trait RawEventSource: Send {
    /// `Ok(None)` once the stream has ended.
    fn next_raw(&mut self) -> impl Future<Output = Result<Option<RawEvent>, SseError>> + Send;
}

/// Frames read from a streaming HTTP response.
pub struct HttpEventSource {
    response: reqwest::Response,
    buffer: Vec<u8>,
}

impl HttpEventSource {
    #[must_use]
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            buffer: Vec::new(),
        }
    }
}

impl RawEventSource for HttpEventSource {
    async fn next_raw(&mut self) -> Result<Option<RawEvent>, SseError> {
        loop {
            while let Some(event) = drain_next_event(&mut self.buffer) {
                if event.is_empty() {
                    continue;
                }
                let Ok(text) = str::from_utf8(&event) else {
                    tracing::debug!(len = event.len(), "Skipping SSE frame with invalid UTF-8");
                    continue;
                };
                if let Some(raw) = parse_raw_event(text) {
                    return Ok(Some(raw));
                }
            }

            match self.response.chunk().await.map_err(SseError::Transport)? {
                Some(chunk) => {
                    self.buffer.extend_from_slice(&chunk);
                    if self.buffer.len() > MAX_SSE_BUFFER_BYTES {
                        return Err(SseError::BufferOverflow);
                    }
                }
                None => return Ok(None),
            }
        }
    }
}

/// Owns a raw source and yields decoded events.
///
/// `read` returns `Ok(None)` once the source has closed or the reader was
/// disposed, and keeps returning it on every later call.
pub struct SseStreamReader<S> {
    source: Option<S>,
}

impl<S: RawEventSource> SseStreamReader<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// Next decoded event. Frames of unknown type or with undecodable data
    /// are skipped. A source failure drops the source and is returned.
    pub async fn read(&mut self) -> Result<Option<ServerEvent>, SseError> {
        loop {
            let Some(source) = self.source.as_mut() else {
                return Ok(None);
            };
            match source.next_raw().await {
                Ok(Some(raw)) => {
                    if let Some(event) = decode_event(&raw) {
                        return Ok(Some(event));
                    }
                    tracing::debug!(event_type = %raw.event_type, "Skipping server event");
                }
                Ok(None) => {
                    self.source = None;
                    return Ok(None);
                }
                Err(e) => {
                    self.source = None;
                    return Err(e);
                }
            }
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    pub fn dispose(&mut self) {
        self.source = None;
    }
}
