use async_trait::async_trait;
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc, Arc, Mutex,
};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use sightline_lib::analysis::{DescriptionClient, ModeContext, RawReply, TrafficMode};
use sightline_lib::audio::{Direction, ToneKind, ToneSpec, ToneSynthesizer};
use sightline_lib::capture::{CameraDevice, DeviceLease, EncodedFrame, FrameGrabber, LeaseGuard};
use sightline_lib::error::{AnalysisError, CaptureDeviceError, EngineError};
use sightline_lib::guidance::{AlertKind, SearchStatus};
use sightline_lib::narration::{SpeechSynthesizer, Utterance};
use sightline_lib::session::{SessionMode, SessionStatus};
use sightline_lib::settings::{CadenceSettings, EngineSettings, ServiceSettings};
use sightline_lib::signals::{DangerLevel, DistanceBand, KeywordExtractor};
use sightline_lib::{Engine, EngineDeps};

// ---- fakes ----

struct FakeCamera {
    lease: DeviceLease,
    brightness: u8,
    /// When set, every grab blocks its thread until the test sends a release.
    hold: Mutex<Option<mpsc::Receiver<()>>>,
}

impl FakeCamera {
    fn new(brightness: u8) -> Self {
        Self {
            lease: DeviceLease::new(),
            brightness,
            hold: Mutex::new(None),
        }
    }

    fn held_by(self, release: mpsc::Receiver<()>) -> Self {
        *self.hold.lock().unwrap() = Some(release);
        self
    }
}

struct FakeGrabber {
    brightness: u8,
    hold: Option<mpsc::Receiver<()>>,
    _guard: LeaseGuard,
}

impl FrameGrabber for FakeGrabber {
    fn grab(&mut self) -> Result<RgbImage, CaptureDeviceError> {
        if let Some(hold) = &self.hold {
            hold.recv_timeout(Duration::from_secs(2))
                .map_err(|_| CaptureDeviceError::Unreadable("frame never released".into()))?;
        }
        let value = self.brightness;
        Ok(RgbImage::from_pixel(16, 16, Rgb([value, value, value])))
    }
}

impl CameraDevice for FakeCamera {
    fn open(&self) -> Result<Box<dyn FrameGrabber>, CaptureDeviceError> {
        let guard = self.lease.acquire(self.name())?;
        Ok(Box::new(FakeGrabber {
            brightness: self.brightness,
            hold: self.hold.lock().unwrap().take(),
            _guard: guard,
        }))
    }

    fn name(&self) -> &str {
        "fake camera"
    }
}

/// Replies in script order; an `Err(status)` entry becomes a server error.
#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<VecDeque<Result<RawReply, u16>>>,
    calls: AtomicUsize,
    /// When set, every call waits for one `notify_one` before answering.
    gate: Option<Arc<Notify>>,
}

impl ScriptedClient {
    fn with(replies: Vec<Result<RawReply, u16>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DescriptionClient for ScriptedClient {
    async fn analyze(
        &self,
        _frame: &EncodedFrame,
        _context: &ModeContext,
    ) -> Result<RawReply, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(status)) => Err(AnalysisError::Server {
                status,
                body: "unavailable".into(),
            }),
            None => Ok(said("nada de interessante")),
        }
    }
}

#[derive(Default)]
struct RecordingSpeech {
    events: Mutex<Vec<String>>,
    speaking: AtomicBool,
}

impl RecordingSpeech {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn spoken(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("speak:").map(str::to_string))
            .collect()
    }
}

impl SpeechSynthesizer for RecordingSpeech {
    fn speak(&self, utterance: &Utterance) -> Result<(), EngineError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("speak:{}", utterance.text));
        self.speaking.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn cancel_all(&self) {
        if self.speaking.swap(false, Ordering::SeqCst) {
            self.events.lock().unwrap().push("cancel".into());
        }
    }
}

#[derive(Default)]
struct RecordingTones {
    played: Mutex<Vec<ToneSpec>>,
}

impl RecordingTones {
    fn played(&self) -> Vec<ToneSpec> {
        self.played.lock().unwrap().clone()
    }
}

impl ToneSynthesizer for RecordingTones {
    fn play(&self, spec: &ToneSpec) -> Result<(), EngineError> {
        self.played.lock().unwrap().push(*spec);
        Ok(())
    }

    fn silence(&self) {}
}

// ---- harness ----

struct Harness {
    engine: Engine,
    camera: Arc<FakeCamera>,
    client: Arc<ScriptedClient>,
    speech: Arc<RecordingSpeech>,
    tones: Arc<RecordingTones>,
}

fn said(description: &str) -> RawReply {
    RawReply {
        description: Some(description.to_string()),
        ..RawReply::default()
    }
}

fn settings() -> EngineSettings {
    // Long cadences: ticks only happen when a test triggers them.
    EngineSettings {
        service: ServiceSettings {
            timeout_ms: 2000,
            ..ServiceSettings::default()
        },
        cadence: CadenceSettings {
            search_ms: 60_000,
            navigation_ms: 60_000,
            crossing_ms: 60_000,
            braille_continuous_ms: 60_000,
        },
        ..EngineSettings::default()
    }
}

fn harness(camera: FakeCamera, client: ScriptedClient) -> Harness {
    harness_with(settings(), camera, client)
}

fn harness_with(settings: EngineSettings, camera: FakeCamera, client: ScriptedClient) -> Harness {
    let camera = Arc::new(camera);
    let client = Arc::new(client);
    let speech = Arc::new(RecordingSpeech::default());
    let tones = Arc::new(RecordingTones::default());

    let engine = Engine::new(
        settings,
        EngineDeps {
            camera: camera.clone(),
            client: client.clone(),
            extractor: Arc::new(KeywordExtractor::new()),
            speech: speech.clone(),
            tones: tones.clone(),
        },
    );

    Harness {
        engine,
        camera,
        client,
        speech,
        tones,
    }
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Trigger one capture and wait for its result to be applied.
async fn tick(h: &Harness) {
    let before = h.engine.stats().completed;
    assert!(h.engine.trigger_capture().await, "no session running");
    wait_until("a completed tick", || h.engine.stats().completed > before).await;
}

// ---- search ----

#[tokio::test]
async fn three_misses_give_one_left_hint() {
    let h = harness(FakeCamera::new(128), ScriptedClient::default());
    h.engine.start_search("chave").await.unwrap();

    for _ in 0..3 {
        tick(&h).await;
    }

    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.search.attempts, 3);
    assert_eq!(snapshot.search.status, SearchStatus::Searching);
    assert_eq!(
        snapshot.search.guidance.as_deref(),
        Some("Tente virar a câmera para a esquerda.")
    );
    assert_eq!(
        snapshot.status_message,
        "Tente virar a câmera para a esquerda."
    );

    let left = ToneKind::Directional(Direction::Left).spec();
    assert_eq!(h.tones.played(), vec![left]);
    assert_eq!(
        h.speech.spoken(),
        vec!["Iniciando busca por: chave. Movimente a câmera lentamente para procurar."]
    );
}

#[tokio::test]
async fn found_object_ends_the_session_and_releases_the_camera() {
    let h = harness(
        FakeCamera::new(128),
        ScriptedClient::with(vec![
            Ok(said("Vejo uma mesa vazia.")),
            Ok(said("OBJETO ENCONTRADO: caneca à direita superior, perto da borda")),
        ]),
    );
    let session = h.engine.start_search("caneca").await.unwrap();
    assert_eq!(session.mode, SessionMode::Search);
    assert!(h.camera.lease.is_held());

    tick(&h).await;
    tick(&h).await;

    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.search.status, SearchStatus::Found);
    assert_eq!(snapshot.search.attempts, 1);
    assert_eq!(
        snapshot.search.location.map(|l| l.label()).as_deref(),
        Some("direita superior")
    );
    assert_eq!(snapshot.search.distance_band, Some(DistanceBand::Near));
    assert_eq!(
        snapshot.session.map(|s| s.status),
        Some(SessionStatus::Stopped)
    );

    assert!(h
        .speech
        .spoken()
        .contains(&"caneca encontrado. Posição: direita superior. Distância: perto.".to_string()));
    assert!(h.tones.played().contains(&ToneKind::Success.spec()));

    assert!(!h.engine.trigger_capture().await);
    wait_until("camera release", || !h.camera.lease.is_held()).await;
    assert_eq!(h.client.calls(), 2);
}

#[tokio::test]
async fn blank_query_is_rejected_and_prompts() {
    let h = harness(FakeCamera::new(128), ScriptedClient::default());

    let err = h.engine.start_search("   ").await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidQuery));
    assert!(!h.camera.lease.is_held());
    assert_eq!(
        h.speech.spoken(),
        vec!["Por favor, digite ou fale o que você procura."]
    );
    assert_eq!(h.engine.snapshot().await.search.status, SearchStatus::Idle);
}

#[tokio::test]
async fn malformed_reply_counts_as_a_miss_and_errors_do_not() {
    let h = harness(
        FakeCamera::new(128),
        ScriptedClient::with(vec![Ok(RawReply::default()), Err(503)]),
    );
    h.engine.start_search("carteira").await.unwrap();

    tick(&h).await;
    assert_eq!(h.engine.snapshot().await.search.attempts, 1);

    assert!(h.engine.trigger_capture().await);
    wait_until("a failed tick", || h.engine.stats().failed == 1).await;
    assert_eq!(h.engine.snapshot().await.search.attempts, 1);
}

#[tokio::test]
async fn stop_and_reset_search() {
    let h = harness(FakeCamera::new(128), ScriptedClient::default());
    h.engine.start_search("óculos").await.unwrap();
    tick(&h).await;

    h.engine.stop_search().await;
    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.search.status, SearchStatus::Stopped);
    assert_eq!(snapshot.search.attempts, 0);
    assert!(!h.camera.lease.is_held());
    assert_eq!(h.speech.spoken().last().map(String::as_str), Some("Busca interrompida."));

    h.engine.reset_search().await;
    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.search.status, SearchStatus::Idle);
    assert_eq!(snapshot.search.recent_queries, vec!["óculos"]);
}

// ---- traffic ----

#[tokio::test]
async fn caution_then_critical_alerts_once() {
    let h = harness(
        FakeCamera::new(128),
        ScriptedClient::with(vec![
            Ok(said("carro próximo à direita, cuidado")),
            Ok(said("perigo crítico, carro muito próximo")),
        ]),
    );
    h.engine
        .start_session(SessionMode::TrafficNavigation)
        .await
        .unwrap();

    tick(&h).await;
    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.traffic.danger_level, DangerLevel::Caution);
    assert_eq!(
        snapshot.traffic.vehicles.iter().collect::<Vec<_>>(),
        vec!["carro"]
    );
    assert!(h.tones.played().is_empty());

    tick(&h).await;
    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.traffic.danger_level, DangerLevel::Critical);
    assert_eq!(h.tones.played(), vec![ToneKind::Critical.spec()]);
    assert_eq!(snapshot.alerts.len(), 2);
    assert_eq!(snapshot.alerts[0].kind, AlertKind::Escalation);
    assert!(snapshot.status_message.starts_with("ALERTA CRÍTICO!"));
}

#[tokio::test]
async fn crossing_verdict_preempts_mode_announcement() {
    let h = harness(
        FakeCamera::new(128),
        ScriptedClient::with(vec![Ok(said("sinal verde, pode atravessar"))]),
    );
    let session = h
        .engine
        .switch_traffic_mode(TrafficMode::Crossing)
        .await
        .unwrap();
    assert_eq!(session.mode, SessionMode::TrafficCrossing);

    tick(&h).await;

    let events = h.speech.events();
    assert_eq!(events.len(), 3);
    assert!(events[0].starts_with("speak:Modo atravessia ativado."));
    assert_eq!(events[1], "cancel");
    assert_eq!(events[2], "speak:Pode atravessar");

    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.traffic.safe_to_cross, Some(true));
    assert_eq!(snapshot.traffic.mode, TrafficMode::Crossing);
}

#[tokio::test]
async fn switching_mode_keeps_readings_and_restarts_capture() {
    let h = harness(
        FakeCamera::new(128),
        ScriptedClient::with(vec![Ok(said("semáforo vermelho, cuidado"))]),
    );
    let first = h
        .engine
        .switch_traffic_mode(TrafficMode::Navigation)
        .await
        .unwrap();
    tick(&h).await;

    let second = h
        .engine
        .switch_traffic_mode(TrafficMode::Crossing)
        .await
        .unwrap();
    assert!(second.epoch > first.epoch);
    assert_eq!(second.cadence_ms, Some(60_000));

    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.traffic.mode, TrafficMode::Crossing);
    assert!(snapshot.traffic.traffic_light_state.is_some());
    assert_eq!(snapshot.alerts.len(), 1);
}

// ---- scheduling ----

#[tokio::test]
async fn stale_result_is_discarded_after_stop() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        FakeCamera::new(128),
        ScriptedClient::with(vec![Ok(said("OBJETO ENCONTRADO à esquerda"))]).gated(gate.clone()),
    );
    let session = h.engine.start_search("chave").await.unwrap();

    assert!(h.engine.trigger_capture().await);
    wait_until("the request to be in flight", || h.client.calls() == 1).await;

    h.engine.stop_search().await;
    assert!(h.engine.current_epoch() > session.epoch);

    gate.notify_one();
    wait_until("the stale result", || h.engine.stats().discarded == 1).await;

    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.search.status, SearchStatus::Stopped);
    assert_eq!(snapshot.search.location, None);
    assert_eq!(h.engine.stats().completed, 0);
    assert!(h.tones.played().is_empty());
}

#[tokio::test]
async fn tick_is_skipped_while_a_capture_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let h = harness(
        FakeCamera::new(128),
        ScriptedClient::default().gated(gate.clone()),
    );
    h.engine.start_search("chave").await.unwrap();

    assert!(h.engine.trigger_capture().await);
    wait_until("the request to be in flight", || h.client.calls() == 1).await;

    assert!(h.engine.trigger_capture().await);
    wait_until("the skipped tick", || h.engine.stats().skipped == 1).await;
    assert_eq!(h.client.calls(), 1);

    gate.notify_one();
    wait_until("the completed tick", || h.engine.stats().completed == 1).await;
    assert_eq!(h.engine.snapshot().await.search.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn timed_cadence_waits_one_period_then_skips_while_busy() {
    let gate = Arc::new(Notify::new());
    let mut fast = settings();
    fast.cadence.search_ms = 50;
    let h = harness_with(
        fast,
        FakeCamera::new(128),
        ScriptedClient::default().gated(gate.clone()),
    );
    h.engine.start_search("chave").await.unwrap();

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(h.engine.stats().ticks, 0);
    assert_eq!(h.client.calls(), 0);

    tokio::time::sleep(Duration::from_millis(360)).await;
    assert_eq!(h.client.calls(), 1);
    let stats = h.engine.stats();
    assert!(stats.skipped >= 3, "only {} ticks skipped", stats.skipped);
    assert_eq!(stats.ticks, stats.skipped + 1);
    assert_eq!(h.engine.snapshot().await.search.attempts, 0);

    gate.notify_one();
    wait_until("the first result", || h.engine.stats().completed == 1).await;
    assert_eq!(h.engine.snapshot().await.search.attempts, 1);
}

#[tokio::test]
async fn slow_frame_grab_leaves_the_runtime_free() {
    let (release, hold) = mpsc::channel();
    let h = harness(FakeCamera::new(128).held_by(hold), ScriptedClient::default());
    h.engine.start_search("chave").await.unwrap();

    assert!(h.engine.trigger_capture().await);
    // The grab is parked on its thread; this task still gets to run and release it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.send(()).unwrap();

    wait_until("the completed tick", || h.engine.stats().completed == 1).await;
    assert_eq!(h.engine.stats().failed, 0);
}

#[tokio::test]
async fn busy_camera_keeps_session_idle_and_narrates_once() {
    let h = harness(FakeCamera::new(128), ScriptedClient::default());
    let held = h.camera.open().unwrap();

    let err = h
        .engine
        .start_session(SessionMode::BrailleSingle)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::CaptureDevice(CaptureDeviceError::Busy(_))
    ));
    assert_eq!(
        h.speech.spoken(),
        vec!["Câmera em uso. Feche outros programas e tente novamente."]
    );
    assert_eq!(
        h.engine.snapshot().await.session.map(|s| s.status),
        Some(SessionStatus::Idle)
    );

    drop(held);
    assert!(h
        .engine
        .start_session(SessionMode::BrailleSingle)
        .await
        .is_ok());
}

#[tokio::test]
async fn new_session_stops_the_previous_one_first() {
    let h = harness(FakeCamera::new(128), ScriptedClient::default());

    let search = h.engine.start_search("chave").await.unwrap();
    let traffic = h
        .engine
        .start_session(SessionMode::TrafficCrossing)
        .await
        .unwrap();

    assert!(traffic.epoch > search.epoch);
    assert!(h.camera.lease.is_held());
    assert_eq!(h.engine.snapshot().await.search.status, SearchStatus::Idle);

    let stopped = h.engine.stop_session().await.unwrap();
    assert_eq!(stopped.status, SessionStatus::Stopped);
    assert!(!h.camera.lease.is_held());
}

// ---- braille ----

#[tokio::test]
async fn dark_braille_capture_warns_then_reads() {
    let h = harness(
        FakeCamera::new(20),
        ScriptedClient::with(vec![Ok(RawReply {
            braille_text: Some("⠕⠇⠁".into()),
            translated_text: Some("olá".into()),
            ..RawReply::default()
        })]),
    );
    let session = h
        .engine
        .start_session(SessionMode::BrailleSingle)
        .await
        .unwrap();
    assert_eq!(session.cadence_ms, None);

    tick(&h).await;

    assert_eq!(
        h.speech.events(),
        vec![
            "speak:Imagem muito escura. Aumente a iluminação.",
            "cancel",
            "speak:Braille lido com sucesso. Texto: olá",
        ]
    );
    let snapshot = h.engine.snapshot().await;
    assert_eq!(snapshot.braille.history.len(), 1);
    assert_eq!(
        snapshot.braille.last.map(|r| r.braille_text).as_deref(),
        Some("⠕⠇⠁")
    );
}
