use serde::Serialize;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{watch, Mutex};

use crate::analysis::{DescriptionClient, TrafficMode};
use crate::audio::ToneSynthesizer;
use crate::capture::CameraDevice;
use crate::error::{CaptureDeviceError, EngineError};
use crate::guidance::{
    AlertEvent, BrailleState, GuidanceEffect, GuidanceState, SearchState, TrafficState,
};
use crate::narration::{NarrationCoordinator, SpeechSynthesizer};
use crate::session::{
    CaptureScheduler, CaptureSession, SchedulerStats, SessionMode, SessionStatus, StatsSnapshot,
};
use crate::settings::EngineSettings;
use crate::signals::SignalExtractor;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const EMPTY_QUERY_PROMPT: &str = "Por favor, digite ou fale o que você procura.";

/// The platform pieces the engine drives.
pub struct EngineDeps {
    pub camera: Arc<dyn CameraDevice>,
    pub client: Arc<dyn DescriptionClient>,
    pub extractor: Arc<dyn SignalExtractor>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub tones: Arc<dyn ToneSynthesizer>,
}

/// Read-only view published after every change.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub session: Option<CaptureSession>,
    pub search: SearchState,
    pub traffic: TrafficState,
    pub braille: BrailleState,
    /// Newest first.
    pub alerts: Vec<AlertEvent>,
    pub stats: StatsSnapshot,
    pub status_message: String,
}

pub(crate) struct EngineShared {
    pub settings: EngineSettings,
    pub camera: Arc<dyn CameraDevice>,
    pub client: Arc<dyn DescriptionClient>,
    pub extractor: Arc<dyn SignalExtractor>,
    pub narration: NarrationCoordinator,
    /// Every guidance mutation and every epoch change happens under this lock.
    pub guidance: Mutex<GuidanceState>,
    pub stats: SchedulerStats,
    session: StdMutex<Option<CaptureSession>>,
    status_message: StdMutex<String>,
    snapshots: watch::Sender<EngineSnapshot>,
}

impl EngineShared {
    pub fn session(&self) -> Option<CaptureSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_session(&self, session: Option<CaptureSession>) {
        *self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = session;
    }

    pub fn mark_stopped(&self, epoch: u64) {
        let mut session = self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(session) = session.as_mut().filter(|s| s.epoch == epoch) {
            session.status = SessionStatus::Stopped;
        }
    }

    fn set_status(&self, text: &str) {
        *self
            .status_message
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = text.to_string();
    }

    /// The last spoken or displayed line of a batch becomes the status line.
    pub fn note_effects(&self, effects: &[GuidanceEffect]) {
        let latest = effects.iter().rev().find_map(|effect| match effect {
            GuidanceEffect::Narrate(text) => Some(text.as_str()),
            GuidanceEffect::Hint { text, .. } => Some(*text),
            GuidanceEffect::Tone(_) | GuidanceEffect::StopSession => None,
        });
        if let Some(text) = latest {
            self.set_status(text);
        }
    }

    pub fn build_snapshot(&self, guidance: &GuidanceState) -> EngineSnapshot {
        EngineSnapshot {
            session: self.session(),
            search: guidance.search.state().clone(),
            traffic: guidance.traffic.state().clone(),
            braille: guidance.braille.state().clone(),
            alerts: guidance.alerts.to_vec(),
            stats: self.stats.snapshot(),
            status_message: self
                .status_message
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
        }
    }

    pub fn publish_with(&self, guidance: &GuidanceState) {
        self.snapshots.send_replace(self.build_snapshot(guidance));
    }

    pub async fn publish(&self) {
        let guidance = self.guidance.lock().await;
        self.publish_with(&guidance);
    }

    /// Speech and tone backends spawn processes and open devices, so they run on the
    /// blocking pool. Awaiting keeps effects in order.
    pub async fn perform(self: &Arc<Self>, effects: Vec<GuidanceEffect>) {
        if effects.is_empty() {
            return;
        }
        let shared = Arc::clone(self);
        if let Err(err) =
            tokio::task::spawn_blocking(move || shared.narration.execute(&effects)).await
        {
            log_warn!("narration worker failed: {err:?}");
        }
    }
}

/// Entry point for the UI layer. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<EngineShared>,
    scheduler: Arc<CaptureScheduler>,
}

impl Engine {
    pub fn new(settings: EngineSettings, deps: EngineDeps) -> Self {
        let narration = NarrationCoordinator::new(
            deps.speech,
            deps.tones,
            settings.voice.clone(),
            settings.tones_enabled,
        );
        let (snapshots, _) = watch::channel(EngineSnapshot::default());

        let shared = Arc::new(EngineShared {
            settings,
            camera: deps.camera,
            client: deps.client,
            extractor: deps.extractor,
            narration,
            guidance: Mutex::new(GuidanceState::default()),
            stats: SchedulerStats::default(),
            session: StdMutex::new(None),
            status_message: StdMutex::new(String::new()),
            snapshots,
        });
        let scheduler = Arc::new(CaptureScheduler::new(Arc::clone(&shared)));

        Self { shared, scheduler }
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Current state, read directly rather than from the last publication.
    pub async fn snapshot(&self) -> EngineSnapshot {
        let guidance = self.shared.guidance.lock().await;
        self.shared.build_snapshot(&guidance)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn current_epoch(&self) -> u64 {
        self.scheduler.current_epoch()
    }

    pub async fn start_search(&self, query: &str) -> Result<CaptureSession, EngineError> {
        self.scheduler.stop().await;

        let started = self.shared.guidance.lock().await.search.start(query);
        let effects = match started {
            Ok(effects) => effects,
            Err(err) => {
                self.speak(&[GuidanceEffect::Narrate(EMPTY_QUERY_PROMPT.to_string())])
                    .await;
                return Err(err);
            }
        };

        match self.scheduler.start(SessionMode::Search).await {
            Ok(session) => {
                self.speak(&effects).await;
                Ok(session)
            }
            Err(err) => {
                self.shared.guidance.lock().await.search.abort();
                Err(self.report_device_error(err).await)
            }
        }
    }

    pub async fn stop_search(&self) {
        if self.scheduler.active_mode().await == Some(SessionMode::Search) {
            self.scheduler.stop().await;
        }
        let effects = self.shared.guidance.lock().await.search.stop();
        self.speak(&effects).await;
    }

    pub async fn reset_search(&self) {
        let effects = self.shared.guidance.lock().await.search.reset();
        self.speak(&effects).await;
    }

    /// Announce the new traffic mode and restart capture at its cadence.
    /// Readings carry over from the previous mode.
    pub async fn switch_traffic_mode(
        &self,
        mode: TrafficMode,
    ) -> Result<CaptureSession, EngineError> {
        let resume = self
            .scheduler
            .active_mode()
            .await
            .and_then(|active| active.traffic_mode())
            .is_some();
        if !resume {
            self.scheduler.stop().await;
            let mut guidance = self.shared.guidance.lock().await;
            guidance.search.abort();
            guidance.traffic.begin(mode);
            guidance.alerts.clear();
        }

        let effects = self.shared.guidance.lock().await.traffic.set_mode(mode);
        self.speak(&effects).await;

        self.start_capture(SessionMode::traffic(mode)).await
    }

    /// Start a session in `mode`. Search sessions need a query: use [`Engine::start_search`].
    pub async fn start_session(&self, mode: SessionMode) -> Result<CaptureSession, EngineError> {
        match mode {
            SessionMode::Search => {
                if !self.shared.guidance.lock().await.search.is_searching() {
                    return Err(EngineError::InvalidQuery);
                }
            }
            other => {
                self.scheduler.stop().await;
                let mut guidance = self.shared.guidance.lock().await;
                guidance.search.abort();
                if let Some(traffic) = other.traffic_mode() {
                    guidance.traffic.begin(traffic);
                    guidance.alerts.clear();
                }
            }
        }

        self.start_capture(mode).await
    }

    pub async fn stop_session(&self) -> Option<CaptureSession> {
        let stopped = self.scheduler.stop().await;
        let effects = self.shared.guidance.lock().await.search.stop();
        self.speak(&effects).await;
        stopped
    }

    /// One capture now, on top of (or instead of) the cadence.
    pub async fn trigger_capture(&self) -> bool {
        self.scheduler.trigger().await
    }

    pub async fn shutdown(&self) {
        self.scheduler.stop().await;
        let shared = Arc::clone(&self.shared);
        if let Err(err) = tokio::task::spawn_blocking(move || shared.narration.hush()).await {
            log_warn!("narration worker failed: {err:?}");
        }
        self.shared.publish().await;
    }

    async fn start_capture(&self, mode: SessionMode) -> Result<CaptureSession, EngineError> {
        match self.scheduler.start(mode).await {
            Ok(session) => {
                self.shared.publish().await;
                Ok(session)
            }
            Err(err) => Err(self.report_device_error(err).await),
        }
    }

    async fn report_device_error(&self, err: CaptureDeviceError) -> EngineError {
        log_info!("narrating capture device failure: {}", err);
        self.speak(&[GuidanceEffect::Narrate(err.user_message().to_string())])
            .await;
        EngineError::CaptureDevice(err)
    }

    /// Update the status line, publish, then perform the audible effects.
    async fn speak(&self, effects: &[GuidanceEffect]) {
        self.shared.note_effects(effects);
        self.shared.publish().await;
        self.shared.perform(effects.to_vec()).await;
    }
}
