//! Single owner of the speech and tone outputs.
//!
//! Each output is exclusive: a new utterance cancels the one in progress, a new tone
//! cuts off the tone in progress. Speech and tones may overlap each other.

pub mod espeak;
pub mod speech;

use std::sync::{Arc, Mutex};

pub use espeak::EspeakSpeech;
pub use speech::{LogSpeech, SpeechSynthesizer, Utterance};

use crate::audio::{ToneKind, ToneSynthesizer};
use crate::guidance::GuidanceEffect;
use crate::settings::VoiceSettings;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub struct NarrationCoordinator {
    speech: Arc<dyn SpeechSynthesizer>,
    tones: Arc<dyn ToneSynthesizer>,
    voice: VoiceSettings,
    tones_enabled: bool,
    /// Serialises cancel-then-speak so two narrations never interleave.
    speaking: Mutex<()>,
}

impl NarrationCoordinator {
    pub fn new(
        speech: Arc<dyn SpeechSynthesizer>,
        tones: Arc<dyn ToneSynthesizer>,
        voice: VoiceSettings,
        tones_enabled: bool,
    ) -> Self {
        Self {
            speech,
            tones,
            voice,
            tones_enabled,
            speaking: Mutex::new(()),
        }
    }

    pub fn narrate(&self, text: &str) {
        if !self.voice.enabled || text.trim().is_empty() {
            return;
        }

        let _turn = self
            .speaking
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.speech.is_speaking() {
            self.speech.cancel_all();
        }
        if let Err(err) = self.speech.speak(&Utterance::new(text, &self.voice)) {
            log_warn!("narration failed: {}", err);
        }
    }

    pub fn play_tone(&self, kind: ToneKind) {
        if !self.tones_enabled {
            return;
        }
        log_debug!("tone {:?}", kind);
        if let Err(err) = self.tones.play(&kind.spec()) {
            log_warn!("tone failed: {}", err);
        }
    }

    /// Silence both outputs.
    pub fn hush(&self) {
        self.speech.cancel_all();
        self.tones.silence();
    }

    /// Perform the audible part of a batch of guidance effects, in order.
    pub fn execute(&self, effects: &[GuidanceEffect]) {
        for effect in effects {
            match effect {
                GuidanceEffect::Narrate(text) => self.narrate(text),
                GuidanceEffect::Tone(kind) => self.play_tone(*kind),
                GuidanceEffect::Hint { .. } | GuidanceEffect::StopSession => {}
            }
        }
    }
}
