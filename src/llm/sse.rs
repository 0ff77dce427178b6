//! Incremental parser for SSE chat-completion streams.
//!
//! Providers deliver streamed completions as `data:`-prefixed frames
//! separated by blank lines, terminated by a literal `[DONE]` payload.
//! The parser is fed raw transport bytes and drains whole events as they
//! become available, so chunk boundaries never split a frame.

use crate::llm::types::StreamChunkEvent;

/// One decoded stream event
#[derive(Debug, PartialEq, Eq)]
pub enum SseEvent {
    /// A content delta (possibly empty, e.g. the role-only first chunk)
    Delta(String),
    /// End-of-stream marker (`data: [DONE]`)
    Done,
}

#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut events = Vec::new();

        while let Some(split) = self.buffer.find("\n\n") {
            let frame: String = self.buffer.drain(..split + 2).collect();

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };

            if payload == "[DONE]" {
                events.push(SseEvent::Done);
                continue;
            }

            if let Ok(event) = serde_json::from_str::<StreamChunkEvent>(&payload) {
                let delta = event
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .unwrap_or_default();
                events.push(SseEvent::Delta(delta));
            }
        }

        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}
