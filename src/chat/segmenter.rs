//! Incremental sentence segmentation of streamed assistant replies
//!
//! This module turns an arbitrarily-chunked text stream into an emotion tag
//! plus sentence-like segments as soon as they become available, so speech
//! synthesis can start before the full reply has arrived. The buffer always
//! holds only not-yet-segmented text; consumed prefixes are never rescanned.

/// A speakable unit extracted from assistant output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// The bracketed emotion tag active for this response ("" until found)
    pub tag: String,

    /// Sentence-like body of this segment
    pub body: String,

    /// Sequential index of this segment in the response
    pub index: usize,
}

impl Segment {
    /// The text handed to synthesis and accumulated into the transcript:
    /// the response tag, a space, then the body.
    pub fn spoken_text(&self) -> String {
        format!("{} {}", self.tag, self.body)
    }
}

/// Terminal punctuation ending a sentence regardless of length
const TERMINALS: [char; 4] = ['.', '!', '?', '\n'];

/// Minimum characters before a comma may end a segment
const COMMA_MIN_CHARS: usize = 10;

/// Opening/closing bracket and quote characters (ASCII + CJK) plus terminal
/// punctuation. A body made of nothing but these is impossible to utter and
/// is dropped instead of dispatched.
const UNSPEAKABLE: &str = "[({「［（【『〈《〔｛«‹〘〚〛〙›»〕》〉』】）］」})].!?,";

/// Streaming segmenter for tag extraction and sentence splitting
///
/// Feed chunks as they arrive; complete segments come back immediately.
/// The tag is captured at most once per response and re-prefixed onto every
/// segment emitted afterwards.
#[derive(Clone, Debug, Default)]
pub struct SentenceSegmenter {
    /// Unconsumed remainder of the response text
    buffer: String,

    /// Captured leading tag, empty until found
    tag: String,

    /// Whether the tag has been captured for this response
    tag_found: bool,

    /// Index assigned to the next emitted segment
    next_index: usize,
}

impl SentenceSegmenter {
    /// Create a new segmenter
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the segmenter to initial state for a new response
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.tag.clear();
        self.tag_found = false;
        self.next_index = 0;
    }

    /// The tag captured so far, empty until one is found
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Text received but not yet consumed into a segment
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Feed a chunk into the segmenter and extract any ready segments
    ///
    /// May return zero or more segments; repeats extraction until the buffer
    /// holds no further complete unit. Unspeakable units are consumed but
    /// not returned.
    pub fn feed(&mut self, chunk: &str) -> Vec<Segment> {
        self.buffer.push_str(chunk);

        let mut segments = Vec::new();
        loop {
            let mut advanced = false;

            if !self.tag_found {
                if let Some(tag_len) = leading_tag_len(&self.buffer) {
                    self.tag = self.buffer[..tag_len].to_string();
                    self.tag_found = true;
                    self.buffer.drain(..tag_len);
                    self.trim_leading_whitespace();
                    advanced = true;
                }
            }

            if let Some(end) = sentence_boundary(&self.buffer) {
                let body: String = self.buffer.drain(..end).collect();
                self.trim_leading_whitespace();
                advanced = true;

                if let Some(segment) = self.emit(body) {
                    segments.push(segment);
                }
            }

            if !advanced {
                break;
            }
        }

        segments
    }

    /// Flush remaining buffered text as a final segment
    ///
    /// Call this when the stream ends; trailing text without terminal
    /// punctuation would otherwise be dropped silently.
    pub fn flush(&mut self) -> Option<Segment> {
        let body = std::mem::take(&mut self.buffer);
        if body.trim().is_empty() {
            return None;
        }
        self.emit(body.trim_end().to_string())
    }

    fn trim_leading_whitespace(&mut self) {
        let trimmed = self.buffer.len() - self.buffer.trim_start().len();
        if trimmed > 0 {
            self.buffer.drain(..trimmed);
        }
    }

    fn emit(&mut self, body: String) -> Option<Segment> {
        if is_unspeakable(&body) {
            return None;
        }

        let segment = Segment {
            tag: self.tag.clone(),
            body,
            index: self.next_index,
        };
        self.next_index += 1;
        Some(segment)
    }
}

/// Length in bytes of a bracketed tag anchored at the start of `buf`,
/// shortest match: `[` + any characters + the first `]`.
fn leading_tag_len(buf: &str) -> Option<usize> {
    if !buf.starts_with('[') {
        return None;
    }
    buf.find(']').map(|close| close + 1)
}

/// Byte length of the earliest prefix of `buf` ending a sentence
///
/// A prefix qualifies when it is at least two characters ending in terminal
/// punctuation, or at least eleven characters ending in a comma.
fn sentence_boundary(buf: &str) -> Option<usize> {
    for (char_idx, (byte_idx, c)) in buf.char_indices().enumerate() {
        if TERMINALS.contains(&c) && char_idx >= 1 {
            return Some(byte_idx + c.len_utf8());
        }
        if c == ',' && char_idx >= COMMA_MIN_CHARS {
            return Some(byte_idx + c.len_utf8());
        }
    }
    None
}

/// Check whether a body consists solely of whitespace, bracket/quote
/// characters and bare punctuation
fn is_unspeakable(body: &str) -> bool {
    body.chars()
        .all(|c| c.is_whitespace() || UNSPEAKABLE.contains(c))
}
