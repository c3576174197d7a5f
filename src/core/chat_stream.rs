use std::collections::VecDeque;
use std::fmt;

use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::StreamChunkPayload;
use crate::core::constants::UNAUTHORIZED_NOTICE;
use crate::core::error::TurnError;
use crate::core::sse::{
    is_event_stream_content_type, is_plain_text_content_type, SseDecoder, SseEvent,
    EVENT_STREAM_CONTENT_TYPE,
};

/// Name of the event the service sends once a run has produced all output.
pub const CLOSE_EVENT: &str = "close";

pub type ByteStream = BoxStream<'static, Result<Vec<u8>, reqwest::Error>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    Chunk(String),
    Closed,
    Failed(String),
    Cancelled,
}

/// What the stream connection turned out to be once its headers arrived.
pub enum StreamOpening<S> {
    /// A live event stream to read increments from.
    Events(EventStream<S>),
    /// A one-shot body: either the whole answer (plain text) or a diagnostic
    /// describing why no event stream was offered.
    Complete(String),
    Cancelled,
}

/// A malformed `message` event. Never leaves this module; the event is
/// logged and skipped.
#[derive(Debug)]
pub enum ChunkParseError {
    InvalidJson(serde_json::Error),
}

impl fmt::Display for ChunkParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkParseError::InvalidJson(err) => write!(f, "invalid chunk payload: {err}"),
        }
    }
}

impl std::error::Error for ChunkParseError {}

/// Decode the text increment of one data event. `Ok(None)` means the event
/// carried no text.
pub fn parse_chunk(data: &str) -> Result<Option<String>, ChunkParseError> {
    let payload: StreamChunkPayload =
        serde_json::from_str(data).map_err(ChunkParseError::InvalidJson)?;
    Ok(payload.chunk.filter(|chunk| !chunk.is_empty()))
}

pub struct EventStream<S> {
    body: S,
    decoder: SseDecoder,
    queued: VecDeque<SseEvent>,
    cancel_token: CancellationToken,
    ended: bool,
}

impl<S, E> EventStream<S>
where
    S: Stream<Item = Result<Vec<u8>, E>> + Unpin,
    E: fmt::Display,
{
    pub fn new(body: S, cancel_token: CancellationToken) -> Self {
        Self {
            body,
            decoder: SseDecoder::default(),
            queued: VecDeque::new(),
            cancel_token,
            ended: false,
        }
    }

    /// Wait for the next text increment or terminal condition. Malformed
    /// events are skipped. Safe to drop mid-wait: decoded events are queued
    /// before the next suspension point.
    pub async fn next_message(&mut self) -> StreamMessage {
        loop {
            if let Some(event) = self.queued.pop_front() {
                if let Some(message) = self.handle_event(event) {
                    return message;
                }
                continue;
            }

            if self.ended {
                return StreamMessage::Closed;
            }

            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return StreamMessage::Cancelled,
                next = self.body.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    let events = self.decoder.push(&bytes);
                    self.queued.extend(events);
                }
                Some(Err(err)) => {
                    self.ended = true;
                    self.queued.clear();
                    return StreamMessage::Failed(err.to_string());
                }
                None => {
                    debug!("Event stream closed by remote");
                    self.ended = true;
                    let events = self.decoder.finish();
                    self.queued.extend(events);
                }
            }
        }
    }

    fn handle_event(&mut self, event: SseEvent) -> Option<StreamMessage> {
        if event.is_named(CLOSE_EVENT) {
            self.ended = true;
            self.queued.clear();
            return Some(StreamMessage::Closed);
        }

        match parse_chunk(&event.data) {
            Ok(Some(chunk)) => Some(StreamMessage::Chunk(chunk)),
            Ok(None) => {
                debug!(event = %event.event, "Stream event without chunk text");
                None
            }
            Err(err) => {
                warn!(event = %event.event, data = %event.data, "Skipping stream event: {err}");
                None
            }
        }
    }
}

/// Open the stream locator and classify the response by content type.
pub async fn open_stream(
    client: &reqwest::Client,
    url: &str,
    cancel_token: CancellationToken,
) -> Result<StreamOpening<ByteStream>, TurnError> {
    let request = client
        .get(url)
        .header("Accept", EVENT_STREAM_CONTENT_TYPE)
        .send();

    let response = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => return Ok(StreamOpening::Cancelled),
        response = request => response.map_err(|err| TurnError::StreamOpen(err.to_string()))?,
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    debug!(url, status = status.as_u16(), content_type = %content_type, "Stream connection opened");

    if is_plain_text_content_type(&content_type) {
        let text = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(StreamOpening::Cancelled),
            text = response.text() => text.map_err(|err| TurnError::StreamOpen(err.to_string()))?,
        };
        return Ok(StreamOpening::Complete(text));
    }

    if status != reqwest::StatusCode::OK || !is_event_stream_content_type(&content_type) {
        let body = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Ok(StreamOpening::Cancelled),
            body = response.text() => body.unwrap_or_default(),
        };
        return Ok(StreamOpening::Complete(format_stream_failure(
            status.as_u16(),
            &body,
        )));
    }

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
        .boxed();
    Ok(StreamOpening::Events(EventStream::new(body, cancel_token)))
}

/// User-facing text for a stream response that is not an event stream.
pub fn format_stream_failure(status: u16, body: &str) -> String {
    let mut parts = Vec::new();
    if status == 401 {
        parts.push(UNAUTHORIZED_NOTICE.to_string());
    }
    if !body.trim().is_empty() {
        parts.push(format_api_error(body));
    }
    if parts.is_empty() {
        parts.push(format!("Stream request failed with HTTP status {status}"));
    }
    parts.join("\n\n")
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.to_string()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("detail")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}

/// One-line summary of an error body: the structured message when the body
/// is JSON, otherwise the collapsed raw text.
pub fn summarize_error_body(error_text: &str) -> Option<String> {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(summary) = extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
            return Some(summary);
        }
    }
    Some(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
}

pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            if let Some(summary) = extract_error_summary(&json_value) {
                if !summary.is_empty() {
                    return format!("API Error: {}\n```json\n{}\n```", summary, pretty_json);
                }
            }
            return format!("API Error:\n```json\n{}\n```", pretty_json);
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{}\n```", trimmed)
    } else {
        format!("API Error:\n```\n{}\n```", trimmed)
    }
}
