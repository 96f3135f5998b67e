//! Incremental healing state machine for streamed LLM output.
//!
//! A [`Healer`] consumes arbitrary text fragments, forwards the JSON portion
//! unchanged, and on end-of-stream synthesizes a closing tail that terminates
//! any open string and every open object and array. When constructed with a
//! JSON Schema, the tail also injects missing `required` properties using
//! schema-declared defaults or `null`.

use std::collections::HashSet;
use std::sync::Arc;

use memchr::memchr2;
use serde_json::Value;

use crate::classify::{closer_for, is_closer, is_json_whitespace, is_opener};
use crate::options::Options;
use crate::schema;

/// One open container on the nesting stack.
#[derive(Debug)]
pub(crate) struct Frame {
    pub(crate) closer: char,
    pub(crate) is_object: bool,
    /// Property names observed inside this object. Unused for arrays.
    pub(crate) keys_seen: HashSet<String>,
    /// The key whose value is currently being read, or `None` when the next
    /// string in this object is a key. Unused for arrays.
    pub(crate) current_key: Option<String>,
    /// True once any key or value has appeared in this frame; decides whether
    /// an injection needs a leading comma.
    pub(crate) has_content: bool,
}

impl Frame {
    fn open(opener: char) -> Self {
        Self {
            closer: closer_for(opener),
            is_object: opener == '{',
            keys_seen: HashSet::new(),
            current_key: None,
            has_content: false,
        }
    }
}

/// Single-pass character-driven healer. Feed chunks through [`process`],
/// then call [`finish`] exactly once; the concatenation of everything
/// returned is the healed output.
///
/// [`process`]: Healer::process
/// [`finish`]: Healer::finish
pub struct Healer {
    opts: Options,
    schema: Option<Arc<Value>>,
    preamble: String,
    started: bool,
    /// Set when the preamble bound was crossed without an opener: the stream
    /// is plain text and passes through uninterpreted.
    plain_text: bool,
    in_string: bool,
    escape_next: bool,
    pending_key: String,
    /// A `,` or `:` at the tip of the stream, plus any whitespace after it.
    /// Withheld from the output until later input proves it is not dangling;
    /// dropped by `finish` if the stream ends right there.
    held: String,
    /// True between a completed object key and the first character of its
    /// value. A frame finished in this state gets `:null` appended so the
    /// healed document stays parseable.
    awaiting_value: bool,
    stack: Vec<Frame>,
    finished: bool,
}

impl Healer {
    /// A healer that repairs structure only (no property injection).
    pub fn new(opts: Options) -> Self {
        Self::build(None, opts)
    }

    /// A healer that additionally injects missing `required` properties
    /// declared by `schema`. The schema is read-only and may be shared
    /// across any number of healers.
    pub fn with_schema(schema: Arc<Value>, opts: Options) -> Self {
        Self::build(Some(schema), opts)
    }

    fn build(schema: Option<Arc<Value>>, opts: Options) -> Self {
        Self {
            opts,
            schema,
            preamble: String::new(),
            started: false,
            plain_text: false,
            in_string: false,
            escape_next: false,
            pending_key: String::new(),
            held: String::new(),
            awaiting_value: false,
            stack: Vec::new(),
            finished: false,
        }
    }

    /// Consume one input fragment and return the portion that is safe to
    /// forward downstream now. Returns the empty string while a preamble is
    /// still being buffered. A separator at the tip of the stream is held
    /// back until the next fragment shows it is followed by more content.
    /// Never fails; malformed input is tolerated as noise.
    pub fn process(&mut self, chunk: &str) -> String {
        if self.finished {
            return String::new();
        }
        if !self.started {
            self.preamble.push_str(chunk);
            if let Some(at) = memchr2(b'{', b'[', self.preamble.as_bytes()) {
                self.started = true;
                let rest = self.preamble.split_off(at);
                self.preamble = String::new();
                return self.scan(&rest);
            }
            let over_bound = self
                .preamble
                .chars()
                .take(self.opts.max_preamble + 1)
                .count()
                > self.opts.max_preamble;
            if over_bound {
                // No JSON in sight: commit to plain-text passthrough.
                self.started = true;
                self.plain_text = true;
                return std::mem::take(&mut self.preamble);
            }
            return String::new();
        }
        if self.plain_text {
            return chunk.to_owned();
        }
        self.scan(chunk)
    }

    /// Synthesize the closing tail. Closes any open string, drops a withheld
    /// dangling separator, completes a key left without a value, then walks
    /// the stack from the innermost frame outward, injecting missing required
    /// properties into each object frame whose governing sub-schema is
    /// resolvable. Call once; later calls (and later `process` calls) are
    /// no-ops returning the empty string.
    pub fn finish(&mut self) -> String {
        if self.finished {
            return String::new();
        }
        self.finished = true;
        if !self.started {
            // Whatever plain text arrived, uninterpreted (possibly empty).
            return std::mem::take(&mut self.preamble);
        }
        if self.plain_text {
            return String::new();
        }

        // A separator still held here never got a successor: dangling.
        self.held.clear();

        let mut tail = String::new();
        if self.in_string {
            tail.push('"');
            self.in_string = false;
            self.escape_next = false;
            self.end_string();
        }
        if self.awaiting_value {
            tail.push_str(":null");
        }

        for depth in (0..self.stack.len()).rev() {
            let frame = &self.stack[depth];
            if frame.is_object {
                if let Some(root) = self.schema.as_deref() {
                    if let Some(sub) =
                        schema::subschema_at(root, &self.stack, depth, self.opts.max_ref_hops)
                    {
                        let injection =
                            schema::injection_for(root, sub, &frame.keys_seen, self.opts.max_ref_hops);
                        if !injection.is_empty() {
                            if frame.has_content {
                                tail.push(',');
                            }
                            tail.push_str(&injection);
                        }
                    }
                }
            }
            tail.push(frame.closer);
        }
        self.stack.clear();
        tail
    }

    /// True while a key string is being read: the next string characters
    /// belong to the innermost object's upcoming key.
    fn collecting_key(&self) -> bool {
        self.stack
            .last()
            .map_or(false, |f| f.is_object && f.current_key.is_none())
    }

    fn scan(&mut self, text: &str) -> String {
        let bytes = text.as_bytes();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;
        while i < bytes.len() {
            // Inside a value string nothing changes until the next quote or
            // backslash; jump there instead of stepping per character.
            if self.in_string && !self.escape_next && !self.collecting_key() {
                match memchr2(b'"', b'\\', &bytes[i..]) {
                    Some(at) => {
                        out.push_str(&text[i..i + at]);
                        i += at;
                    }
                    None => {
                        out.push_str(&text[i..]);
                        break;
                    }
                }
            }
            let (c, len) = next_char(text, i);
            if len == 0 {
                break;
            }
            if self.in_string {
                self.scan_in_string(c);
                out.push(c);
            } else {
                self.scan_structural(c, &mut out);
            }
            i += len;
        }
        out
    }

    fn scan_in_string(&mut self, c: char) {
        if self.escape_next {
            self.escape_next = false;
        } else if c == '\\' {
            self.escape_next = true;
        } else if c == '"' {
            self.in_string = false;
            self.end_string();
        } else if self.collecting_key() {
            self.pending_key.push(c);
        }
    }

    /// A closing quote was seen (or synthesized at end of stream). If the
    /// string was a key, record it and switch the frame to value position.
    fn end_string(&mut self) {
        match self.stack.last_mut() {
            Some(top) if top.is_object && top.current_key.is_none() => {
                let key = std::mem::take(&mut self.pending_key);
                top.keys_seen.insert(key.clone());
                top.current_key = Some(key);
                self.awaiting_value = true;
            }
            _ => self.awaiting_value = false,
        }
    }

    fn scan_structural(&mut self, c: char, out: &mut String) {
        match c {
            '"' => {
                self.release_held(out);
                self.in_string = true;
                self.pending_key.clear();
                if let Some(top) = self.stack.last_mut() {
                    top.has_content = true;
                }
                self.awaiting_value = false;
                out.push('"');
            }
            _ if is_opener(c) => {
                self.release_held(out);
                if let Some(parent) = self.stack.last_mut() {
                    parent.has_content = true;
                }
                self.stack.push(Frame::open(c));
                self.awaiting_value = false;
                out.push(c);
            }
            _ if is_closer(c) => {
                // Pop only on an exact closer match; stray closers are noise.
                self.release_held(out);
                if self.stack.last().map_or(false, |f| f.closer == c) {
                    self.stack.pop();
                }
                self.awaiting_value = false;
                out.push(c);
            }
            ',' => {
                if let Some(top) = self.stack.last_mut() {
                    if top.is_object {
                        top.current_key = None;
                    }
                }
                self.awaiting_value = false;
                self.held.push(',');
            }
            ':' => {
                self.held.push(':');
            }
            _ if is_json_whitespace(c) => {
                if self.held.is_empty() {
                    out.push(c);
                } else {
                    self.held.push(c);
                }
            }
            _ => {
                // Any other character is value content (digits, literals, …).
                self.release_held(out);
                if let Some(top) = self.stack.last_mut() {
                    top.has_content = true;
                }
                self.awaiting_value = false;
                out.push(c);
            }
        }
    }

    /// Later input proved the held separator was not dangling: emit it.
    fn release_held(&mut self, out: &mut String) {
        if !self.held.is_empty() {
            out.push_str(&self.held);
            self.held.clear();
        }
    }
}

#[inline]
fn next_char(s: &str, i: usize) -> (char, usize) {
    if i >= s.len() {
        return ('\0', 0);
    }
    match s[i..].chars().next() {
        Some(c) => (c, c.len_utf8()),
        None => ('\0', 0),
    }
}
