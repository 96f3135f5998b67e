//! Server-Sent-Events plumbing: frame splitting and per-stream healing.

use memchr::memmem;
use serde_json::Value;

use crate::healer::Healer;

/// Reassembles SSE frames from an arbitrarily chunked byte stream. A frame
/// is a block terminated by a blank line (`\n\n` or `\r\n\r\n`); the
/// terminator is not part of the returned frame.
#[derive(Default)]
pub struct FrameSplitter {
    buf: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `bytes` and return any frames they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            let lf = memmem::find(&self.buf, b"\n\n").map(|at| (at, 2));
            let crlf = memmem::find(&self.buf, b"\r\n\r\n").map(|at| (at, 4));
            let (at, sep) = match (lf, crlf) {
                (Some(a), Some(b)) => {
                    if a.0 <= b.0 {
                        a
                    } else {
                        b
                    }
                }
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => break,
            };
            let frame: Vec<u8> = self.buf.drain(..at + sep).take(at).collect();
            frames.push(String::from_utf8_lossy(&frame).into_owned());
        }
        frames
    }

    /// Any buffered bytes left over after the stream ends.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// One streaming response being healed: routes `choices[0].delta.content`
/// through a [`Healer`] and, at `[DONE]`, synthesizes a frame carrying the
/// closing tail.
pub struct SseSession {
    healer: Healer,
    /// The last content-bearing frame, reused as the envelope for the
    /// synthesized tail frame so it matches the upstream wire shape.
    template: Option<Value>,
    done: bool,
}

impl SseSession {
    pub fn new(healer: Healer) -> Self {
        Self {
            healer,
            template: None,
            done: false,
        }
    }

    /// True once the upstream `[DONE]` marker has been handled.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Transform one upstream frame into the frames to forward. Frames that
    /// are not content deltas, and frames whose payload fails to parse as
    /// JSON, pass through verbatim.
    pub fn on_frame(&mut self, frame: &str) -> Vec<String> {
        let Some(data) = data_payload(frame) else {
            return vec![frame.to_owned()];
        };
        if data.trim() == "[DONE]" {
            self.done = true;
            let mut out = Vec::new();
            if let Some(tail) = self.finish_frame() {
                out.push(tail);
            }
            out.push(frame.to_owned());
            return out;
        }
        let Ok(mut value) = serde_json::from_str::<Value>(&data) else {
            return vec![frame.to_owned()];
        };
        let content = value
            .pointer("/choices/0/delta/content")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let Some(content) = content else {
            return vec![frame.to_owned()];
        };
        let healed = self.healer.process(&content);
        if let Some(slot) = value.pointer_mut("/choices/0/delta/content") {
            *slot = Value::String(healed);
        }
        let wire = format!("data: {value}");
        self.template = Some(value);
        vec![wire]
    }

    /// The synthesized frame carrying the `finish` tail, or `None` when the
    /// output was already complete.
    pub fn finish_frame(&mut self) -> Option<String> {
        let tail = self.healer.finish();
        if tail.is_empty() {
            return None;
        }
        let mut value = self.template.take().unwrap_or_else(|| {
            serde_json::json!({ "choices": [ { "index": 0, "delta": {} } ] })
        });
        if let Some(delta) = value.pointer_mut("/choices/0/delta") {
            *delta = serde_json::json!({ "content": tail });
        }
        Some(format!("data: {value}"))
    }
}

/// The payload of the first `data:` line of a frame.
fn data_payload(frame: &str) -> Option<String> {
    for line in frame.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("data:") {
            return Some(rest.strip_prefix(' ').unwrap_or(rest).to_owned());
        }
    }
    None
}
