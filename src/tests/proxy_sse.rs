use super::*;

use std::sync::Arc;

use serde_json::{json, Value};

use crate::proxy::sse::{FrameSplitter, SseSession};

fn delta_frame(content: &str) -> String {
    format!(
        "data: {}",
        json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": content}}]})
    )
}

fn content_of(frame: &str) -> Option<String> {
    let data = frame.strip_prefix("data: ")?;
    let v: Value = serde_json::from_str(data).ok()?;
    v.pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

#[test]
fn splitter_reassembles_frames_across_chunks() {
    let mut splitter = FrameSplitter::new();
    assert_eq!(splitter.push(b"data: a\n\ndata: b\n"), vec!["data: a"]);
    assert_eq!(splitter.push(b"\n"), vec!["data: b"]);
    assert_eq!(splitter.take_remainder(), None);
}

#[test]
fn splitter_handles_crlf_terminators() {
    let mut splitter = FrameSplitter::new();
    let frames = splitter.push(b"data: a\r\n\r\ndata: b\r\n\r\n");
    assert_eq!(frames, vec!["data: a", "data: b"]);
}

#[test]
fn splitter_returns_trailing_partial_frame() {
    let mut splitter = FrameSplitter::new();
    assert!(splitter.push(b"data: unterminated").is_empty());
    assert_eq!(
        splitter.take_remainder(),
        Some("data: unterminated".to_owned())
    );
}

#[test]
fn non_content_frames_pass_through() {
    let healer = Healer::new(Options::default());
    let mut session = SseSession::new(healer);
    let frame = format!(
        "data: {}",
        json!({"choices": [{"index": 0, "delta": {"role": "assistant"}}]})
    );
    assert_eq!(session.on_frame(&frame), vec![frame.clone()]);
}

#[test]
fn malformed_payload_passes_through() {
    let healer = Healer::new(Options::default());
    let mut session = SseSession::new(healer);
    let frame = "data: {oops";
    assert_eq!(session.on_frame(frame), vec![frame.to_owned()]);
}

#[test]
fn comment_frames_pass_through() {
    let healer = Healer::new(Options::default());
    let mut session = SseSession::new(healer);
    assert_eq!(session.on_frame(": ping"), vec![": ping".to_owned()]);
}

#[test]
fn deltas_are_healed_and_tail_precedes_done() {
    let schema = Arc::new(json!({"required": ["a", "b"]}));
    let healer = Healer::with_schema(schema, Options::default());
    let mut session = SseSession::new(healer);

    let mut contents = String::new();
    let mut frames = Vec::new();
    for frame in [
        delta_frame("Sure: {\"a"),
        delta_frame("\":1"),
        "data: [DONE]".to_owned(),
    ] {
        frames.extend(session.on_frame(&frame));
    }
    assert!(session.is_done());
    assert_eq!(frames.last().map(String::as_str), Some("data: [DONE]"));
    for frame in &frames {
        if let Some(c) = content_of(frame) {
            contents.push_str(&c);
        }
    }
    let v: Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(v, json!({"a":1,"b":null}));
}

#[test]
fn complete_output_synthesizes_no_tail_frame() {
    let healer = Healer::new(Options::default());
    let mut session = SseSession::new(healer);
    session.on_frame(&delta_frame("{\"a\":1}"));
    let out = session.on_frame("data: [DONE]");
    assert_eq!(out, vec!["data: [DONE]".to_owned()]);
}

#[test]
fn tail_frame_reuses_the_upstream_envelope() {
    let healer = Healer::new(Options::default());
    let mut session = SseSession::new(healer);
    session.on_frame(&delta_frame("{\"a\":1"));
    let tail = session.finish_frame().unwrap();
    let v: Value = serde_json::from_str(tail.strip_prefix("data: ").unwrap()).unwrap();
    assert_eq!(v["id"], json!("c1"));
    assert_eq!(v.pointer("/choices/0/delta/content"), Some(&json!("}")));
}

#[test]
fn done_without_content_emits_no_tail() {
    let healer = Healer::new(Options::default());
    let mut session = SseSession::new(healer);
    let out = session.on_frame("data: [DONE]");
    assert_eq!(out, vec!["data: [DONE]".to_owned()]);
}
