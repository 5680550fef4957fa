//! Mapping from bracketed emotion tags to avatar expressions
//!
//! The model is prompted to open each reply with a tag like `[happy]`; the
//! avatar/speech subsystem uses the parsed emotion to pick expression and
//! voice style. Unknown or missing tags fall back to neutral.

use serde::{Deserialize, Serialize};

use crate::chat::segmenter::Segment;

/// Avatar expression / voice style for a spoken segment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Angry,
    Sad,
    Relaxed,
}

impl Emotion {
    /// Parse an emotion from a bracketed tag such as `"[Happy]"`.
    ///
    /// Matching is case-insensitive; anything unrecognized yields `None`.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let name = tag.strip_prefix('[')?.strip_suffix(']')?;
        match name.to_ascii_lowercase().as_str() {
            "neutral" => Some(Emotion::Neutral),
            "happy" => Some(Emotion::Happy),
            "angry" => Some(Emotion::Angry),
            "sad" => Some(Emotion::Sad),
            "relaxed" => Some(Emotion::Relaxed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
            Emotion::Sad => "sad",
            Emotion::Relaxed => "relaxed",
        }
    }
}

/// One speakable unit with its resolved expression
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Screenplay {
    pub emotion: Emotion,
    /// Text handed to synthesis (tag-prefixed spoken form)
    pub text: String,
}

impl Screenplay {
    pub fn from_segment(segment: &Segment) -> Self {
        Self {
            emotion: Emotion::parse_tag(&segment.tag).unwrap_or_default(),
            text: segment.spoken_text(),
        }
    }
}
