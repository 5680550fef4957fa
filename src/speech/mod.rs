//! Speech synthesis and ordered playback dispatch
//!
//! This module provides:
//! - The `SpeechEngine` trait consumed by the dispatcher (synthesis and
//!   playback are opaque, backends live outside this crate)
//! - The `SpeechDispatcher`, which guarantees playback order matches
//!   dispatch order regardless of per-segment synthesis latency

pub mod dispatcher;

use async_trait::async_trait;

use crate::chat::screenplay::Screenplay;
use crate::Result;

// Re-export commonly used types
pub use dispatcher::{SpeechDispatcher, SpeechEvent};

/// Synthesized audio for one segment, ready for playback
#[derive(Clone, Debug)]
pub struct SynthesizedSpeech {
    /// Audio samples (f32, mono)
    pub samples: Vec<f32>,

    /// Sample rate of the audio
    pub sample_rate: u32,
}

impl SynthesizedSpeech {
    /// Get the duration of this audio in seconds
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Get the duration of this audio in milliseconds
    pub fn duration_ms(&self) -> u64 {
        (self.samples.len() as u64 * 1000) / self.sample_rate.max(1) as u64
    }
}

/// Opaque synthesis + playback subsystem
///
/// `synthesize` may run concurrently for several segments; `play` is only
/// ever called for one segment at a time, in dispatch order.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn synthesize(&self, screenplay: &Screenplay) -> Result<SynthesizedSpeech>;

    async fn play(&self, speech: SynthesizedSpeech) -> Result<()>;
}

/// Headless engine for runs without an audio backend.
///
/// Produces silence sized to a rough speaking pace and sleeps it out during
/// playback, so captions and ordering behave as they would with real audio.
pub struct NullEngine {
    sample_rate: u32,
    millis_per_char: u64,
}

impl NullEngine {
    pub fn new(millis_per_char: u64) -> Self {
        Self {
            sample_rate: 22050,
            millis_per_char,
        }
    }
}

impl Default for NullEngine {
    fn default() -> Self {
        Self::new(60)
    }
}

#[async_trait]
impl SpeechEngine for NullEngine {
    async fn synthesize(&self, screenplay: &Screenplay) -> Result<SynthesizedSpeech> {
        let ms = screenplay.text.chars().count() as u64 * self.millis_per_char;
        let samples = (self.sample_rate as u64 * ms / 1000) as usize;
        Ok(SynthesizedSpeech {
            samples: vec![0.0; samples],
            sample_rate: self.sample_rate,
        })
    }

    async fn play(&self, speech: SynthesizedSpeech) -> Result<()> {
        tokio::time::sleep(std::time::Duration::from_millis(speech.duration_ms())).await;
        Ok(())
    }
}
