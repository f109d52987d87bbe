//! Capability interfaces for the optional output and input channels.
//!
//! Each channel reports whether it is available on the current device and is
//! invoked fire-and-forget. Whether a channel is *enabled* is a user setting
//! and is checked by the coordinator, not by the channel itself.

use async_trait::async_trait;

use crate::config::Language;
use crate::errors::SideEffectError;

// ── Audio cues ───────────────────────────────────────────────────────────────

/// One sine tone, started `delay_ms` after the cue begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_ms: u32,
    pub delay_ms: u32,
}

fn tone(frequency_hz: f32, duration_ms: u32, delay_ms: u32) -> Tone {
    Tone { frequency_hz, duration_ms, delay_ms }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Send,
    Receive,
    Error,
}

impl Cue {
    pub fn pattern(&self) -> [Tone; 2] {
        match self {
            Cue::Send => [tone(400.0, 100, 0), tone(600.0, 100, 50)],
            Cue::Receive => [tone(800.0, 150, 0), tone(1000.0, 100, 100)],
            Cue::Error => [tone(300.0, 200, 0), tone(200.0, 200, 100)],
        }
    }
}

pub trait AudioCuePlayer: Send + Sync {
    fn is_available(&self) -> bool;

    fn play(&self, cue: Cue, pattern: &[Tone]) -> Result<(), SideEffectError>;
}

// ── Speech synthesis ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 tag, e.g. `en-US`.
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub voice: Option<Voice>,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>, language: Language, voices: &[Voice]) -> Self {
        let voice = resolve_voice(voices, language).cloned();
        let lang = voice
            .as_ref()
            .map(|v| v.lang.clone())
            .unwrap_or_else(|| language.code().to_string());
        Self { text: text.into(), voice, lang, rate: 1.0, pitch: 1.0, volume: 1.0 }
    }
}

/// First voice whose tag starts with the language code, else the first
/// voice at all.
pub fn resolve_voice(voices: &[Voice], language: Language) -> Option<&Voice> {
    voices
        .iter()
        .find(|v| v.lang.starts_with(language.code()))
        .or_else(|| voices.first())
}

pub trait SpeechSynthesizer: Send + Sync {
    fn is_available(&self) -> bool;

    fn voices(&self) -> Vec<Voice>;

    /// Stops whatever is currently being spoken. Must not fail.
    fn cancel(&self);

    fn speak(&self, utterance: Utterance) -> Result<(), SideEffectError>;
}

// ── Speech recognition ───────────────────────────────────────────────────────

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn is_available(&self) -> bool;

    /// Captures a single utterance and returns its transcript.
    async fn listen(&self, language: Language) -> Result<String, SideEffectError>;
}

// ── Absent capability ────────────────────────────────────────────────────────

/// Stand-in for a device without audio or speech support.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl AudioCuePlayer for Unsupported {
    fn is_available(&self) -> bool {
        false
    }

    fn play(&self, _cue: Cue, _pattern: &[Tone]) -> Result<(), SideEffectError> {
        Err(SideEffectError::Unsupported { channel: "audio" })
    }
}

impl SpeechSynthesizer for Unsupported {
    fn is_available(&self) -> bool {
        false
    }

    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn cancel(&self) {}

    fn speak(&self, _utterance: Utterance) -> Result<(), SideEffectError> {
        Err(SideEffectError::Unsupported { channel: "speech synthesis" })
    }
}

#[async_trait]
impl SpeechRecognizer for Unsupported {
    fn is_available(&self) -> bool {
        false
    }

    async fn listen(&self, _language: Language) -> Result<String, SideEffectError> {
        Err(SideEffectError::Unsupported { channel: "speech recognition" })
    }
}
