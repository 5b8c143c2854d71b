use crate::error::EngineError;
use crate::settings::VoiceSettings;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// One spoken message with the voice it should be spoken in.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>, voice: &VoiceSettings) -> Self {
        Self {
            text: text.into(),
            lang: voice.lang.clone(),
            rate: voice.rate,
            pitch: voice.pitch,
        }
    }
}

/// Platform text-to-speech. `speak` returns once the utterance has been queued.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, utterance: &Utterance) -> Result<(), EngineError>;

    fn is_speaking(&self) -> bool;

    fn cancel_all(&self);
}

/// Writes utterances to the log. Used when no speech backend is installed.
#[derive(Debug, Default)]
pub struct LogSpeech;

impl SpeechSynthesizer for LogSpeech {
    fn speak(&self, utterance: &Utterance) -> Result<(), EngineError> {
        log_info!("🔊 [{}] {}", utterance.lang, utterance.text);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        false
    }

    fn cancel_all(&self) {}
}
