use std::sync::Arc;

use tracing::{debug, warn};

use crate::channels::{AudioCuePlayer, Cue, SpeechRecognizer, SpeechSynthesizer, Unsupported, Utterance};
use crate::config::{Language, Settings};

/// Dispatches audio and speech requests to their channels.
///
/// Every call is best-effort: a disabled or unavailable channel is skipped and
/// a failing one is logged, never reported back to the caller.
#[derive(Clone)]
pub struct SideEffectCoordinator {
    audio: Arc<dyn AudioCuePlayer>,
    synth: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn SpeechRecognizer>,
}

impl Default for SideEffectCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(Unsupported), Arc::new(Unsupported), Arc::new(Unsupported))
    }
}

impl SideEffectCoordinator {
    pub fn new(
        audio: Arc<dyn AudioCuePlayer>,
        synth: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self { audio, synth, recognizer }
    }

    pub fn play_cue(&self, cue: Cue, settings: &Settings) {
        if !settings.audio_enabled || !self.audio.is_available() {
            return;
        }
        if let Err(e) = self.audio.play(cue, &cue.pattern()) {
            warn!("Audio cue {cue:?} failed: {e}");
        }
    }

    /// Cancel-then-speak: a new utterance always replaces the current one.
    pub fn speak(&self, text: &str, language: Language, settings: &Settings) {
        if !settings.speech_output_enabled || text.is_empty() || !self.synth.is_available() {
            return;
        }
        self.synth.cancel();
        let utterance = Utterance::new(text, language, &self.synth.voices());
        if utterance.voice.is_none() {
            debug!("No voice for '{}', using engine default", language.code());
        }
        if let Err(e) = self.synth.speak(utterance) {
            warn!("Speech synthesis failed: {e}");
        }
    }

    pub fn stop_speaking(&self) {
        if self.synth.is_available() {
            self.synth.cancel();
        }
    }

    pub fn can_listen(&self, settings: &Settings) -> bool {
        settings.speech_input_enabled && self.recognizer.is_available()
    }

    pub fn recognizer(&self) -> Arc<dyn SpeechRecognizer> {
        Arc::clone(&self.recognizer)
    }
}
