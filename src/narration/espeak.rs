use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use crate::error::EngineError;

use super::speech::{SpeechSynthesizer, Utterance};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const PROGRAM: &str = "espeak-ng";
const BASE_WORDS_PER_MINUTE: f32 = 175.0;
const BASE_PITCH: f32 = 50.0;

/// Speech through an `espeak-ng` child process. At most one child is alive at a time.
pub struct EspeakSpeech {
    current: Mutex<Option<Child>>,
}

impl EspeakSpeech {
    /// `None` when `espeak-ng` is not on `PATH`.
    pub fn detect() -> Option<Self> {
        let available = Command::new(PROGRAM)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if !available {
            log_warn!("{} not found, narration will only be logged", PROGRAM);
            return None;
        }

        Some(Self {
            current: Mutex::new(None),
        })
    }

    fn voice_for(lang: &str) -> String {
        lang.to_ascii_lowercase()
    }

    fn args_for(utterance: &Utterance) -> Vec<String> {
        let speed = (BASE_WORDS_PER_MINUTE * utterance.rate.clamp(0.1, 10.0)).round() as u32;
        let pitch = (BASE_PITCH * utterance.pitch.clamp(0.0, 2.0)).round().min(99.0) as u32;
        vec![
            "-v".into(),
            Self::voice_for(&utterance.lang),
            "-s".into(),
            speed.to_string(),
            "-p".into(),
            pitch.to_string(),
            "--".into(),
            utterance.text.clone(),
        ]
    }
}

impl SpeechSynthesizer for EspeakSpeech {
    fn speak(&self, utterance: &Utterance) -> Result<(), EngineError> {
        let mut current = self
            .current
            .lock()
            .map_err(|e| EngineError::Speech(e.to_string()))?;

        if let Some(mut previous) = current.take() {
            let _ = previous.kill();
            let _ = previous.wait();
        }

        log_debug!("espeak: {}", utterance.text);
        let child = Command::new(PROGRAM)
            .args(Self::args_for(utterance))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::Speech(format!("failed to spawn {PROGRAM}: {e}")))?;

        *current = Some(child);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        let Ok(mut current) = self.current.lock() else {
            return false;
        };
        match current.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) => {
                *current = None;
                false
            }
            None => false,
        }
    }

    fn cancel_all(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(mut child) = current.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}
