pub mod tone;

pub use tone::{Direction, GainEnvelope, ToneKind, ToneSource, ToneSpec, Waveform};

use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

use crate::error::EngineError;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Alert tone output. Playing a tone cuts off whatever tone was playing.
pub trait ToneSynthesizer: Send + Sync {
    fn play(&self, spec: &ToneSpec) -> Result<(), EngineError>;

    fn silence(&self);
}

enum ToneCommand {
    Play(ToneSpec),
    Silence,
}

/// rodio-backed tones on a dedicated thread (rodio's stream is not `Send`).
pub struct RodioToneEngine {
    tx: Arc<Mutex<Option<Sender<ToneCommand>>>>,
}

impl Default for RodioToneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioToneEngine {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<ToneCommand>, EngineError> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|e| EngineError::Tone(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<ToneCommand>();

        thread::Builder::new()
            .name("tone-engine".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_output(
                    output: &mut Option<(OutputStream, OutputStreamHandle)>,
                ) -> Result<&OutputStreamHandle, String> {
                    if output.is_none() {
                        let pair = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        *output = Some(pair);
                    }
                    output
                        .as_ref()
                        .map(|(_, handle)| handle)
                        .ok_or_else(|| "audio output unavailable".to_string())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        ToneCommand::Play(spec) => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            let handle = match ensure_output(&mut output) {
                                Ok(handle) => handle,
                                Err(err) => {
                                    log_warn!("tone dropped: {}", err);
                                    continue;
                                }
                            };
                            match Sink::try_new(handle) {
                                Ok(new_sink) => {
                                    new_sink.append(ToneSource::new(spec));
                                    sink = Some(new_sink);
                                }
                                Err(err) => {
                                    log_warn!("Failed to create audio sink: {}", err);
                                }
                            }
                        }
                        ToneCommand::Silence => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                        }
                    }
                }
            })
            .map_err(|e| EngineError::Tone(e.to_string()))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl ToneSynthesizer for RodioToneEngine {
    fn play(&self, spec: &ToneSpec) -> Result<(), EngineError> {
        let tx = self.ensure_thread()?;
        tx.send(ToneCommand::Play(*spec))
            .map_err(|e| EngineError::Tone(e.to_string()))
    }

    fn silence(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(ToneCommand::Silence);
        }
    }
}
