//! Event-stream framing.
//!
//! Bytes arrive in arbitrary pieces; [`SseDecoder`] reassembles lines and
//! groups `event:`/`data:` fields into events, dispatching on blank lines.

use memchr::memchr;
use tracing::warn;

pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
pub const DEFAULT_EVENT_NAME: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    pub fn is_named(&self, name: &str) -> bool {
        self.event == name
    }
}

#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let mut line_end = newline_pos;
            if line_end > 0 && self.buffer[line_end - 1] == b'\r' {
                line_end -= 1;
            }
            match std::str::from_utf8(&self.buffer[..line_end]) {
                Ok(line) => {
                    let line = line.to_owned();
                    self.process_line(&line, &mut events);
                }
                Err(err) => warn!("Invalid UTF-8 in event stream: {err}"),
            }
            self.buffer.drain(..=newline_pos);
        }

        events
    }

    /// Flush a trailing line and any event that was never terminated by a
    /// blank line. Called once the connection has ended.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            match std::str::from_utf8(&rest) {
                Ok(line) => self.process_line(line.trim_end_matches('\r'), &mut events),
                Err(err) => warn!("Invalid UTF-8 in event stream: {err}"),
            }
        }
        self.dispatch(&mut events);
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => match self.data.as_mut() {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        let event = self.event.take();
        let data = self.data.take();
        if event.is_none() && data.is_none() {
            return;
        }
        events.push(SseEvent {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_NAME.to_string()),
            data: data.unwrap_or_default(),
        });
    }
}

fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().map(str::trim).unwrap_or("")
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    media_type(content_type).eq_ignore_ascii_case(EVENT_STREAM_CONTENT_TYPE)
}

pub fn is_plain_text_content_type(content_type: &str) -> bool {
    media_type(content_type).eq_ignore_ascii_case("text/plain")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_partial_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"chunk\":").is_empty());
        assert!(decoder.push(b"\"ab\"}\n").is_empty());
        let events = decoder.push(b"\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "message".into(),
                data: "{\"chunk\":\"ab\"}".into()
            }]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn named_events_without_data_are_dispatched() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"event: close\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert!(events[0].is_named("close"));
        assert_eq!(events[0].data, "");
    }

    #[test]
    fn multi_line_data_and_comments() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\nevent: message\ndata: one\ndata:two\nid: 7\n\n");
        assert_eq!(
            events,
            vec![SseEvent {
                event: "message".into(),
                data: "one\ntwo".into()
            }]
        );
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: tail").is_empty());
        let events = decoder.finish();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "tail");
    }

    #[test]
    fn blank_lines_alone_dispatch_nothing() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"\n\n\r\n").is_empty());
    }

    #[test]
    fn content_type_detection() {
        assert!(is_event_stream_content_type("text/event-stream; charset=utf-8"));
        assert!(!is_event_stream_content_type("application/json"));
        assert!(is_plain_text_content_type("text/plain;charset=UTF-8"));
        assert!(!is_plain_text_content_type("text/html"));
    }
}
