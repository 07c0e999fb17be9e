//! The backend's status channel: a server-sent-events stream of
//! `data: {"status": "..."}` frames interleaved with heartbeats.

use crate::lines::LineBuffer;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    Status(String),
    Heartbeat,
}

/// Parse the payload of one SSE frame. Unrecognised payloads yield `None`.
pub fn parse_status(payload: &str) -> Option<StatusUpdate> {
    let v: Value = serde_json::from_str(payload.trim()).ok()?;
    if let Some(s) = v.get("status").and_then(Value::as_str) {
        return Some(StatusUpdate::Status(s.to_string()));
    }
    if v.get("heartbeat").is_some() {
        return Some(StatusUpdate::Heartbeat);
    }
    None
}

#[derive(Debug, Default)]
pub struct SseBuffer {
    lines: LineBuffer,
    data: Vec<String>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StatusUpdate> {
        let mut out = Vec::new();
        for line in self.lines.push(chunk) {
            if line.is_empty() {
                if let Some(u) = self.dispatch() {
                    out.push(u);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line.as_str(), ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }
        out
    }

    fn dispatch(&mut self) -> Option<StatusUpdate> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        parse_status(&payload)
    }
}
