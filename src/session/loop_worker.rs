use chrono::Utc;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tokio::sync::Notify;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::analysis::{describe, AnalysisReply, AnalysisResult};
use crate::capture::{capture, preprocess, Frame, FrameGrabber};
use crate::engine::EngineShared;
use crate::error::{AnalysisError, EngineError};
use crate::guidance::GuidanceEffect;

use super::state::{Cadence, SessionMode};

// Set to false to silence per-tick logging
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// A session's view of the shared epoch counter, its cancellation and its flight flag.
#[derive(Clone)]
pub(crate) struct SessionLink {
    epoch: u64,
    current: Arc<AtomicU64>,
    cancel_token: CancellationToken,
    in_flight: Arc<AtomicBool>,
}

impl SessionLink {
    pub fn new(epoch: u64, current: Arc<AtomicU64>) -> Self {
        Self {
            epoch,
            current,
            cancel_token: CancellationToken::new(),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.epoch
    }

    pub fn accepts(&self, result: &AnalysisResult) -> bool {
        result.session_epoch == self.epoch && self.is_current()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Retire this session: its results stop applying and its loop exits.
    /// Callers hold the guidance lock so no result can apply halfway through.
    pub fn invalidate(&self) {
        let _ = self.current.compare_exchange(
            self.epoch,
            self.epoch + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.cancel_token.cancel();
    }

    fn begin_flight(&self) -> Option<FlightGuard> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(FlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

/// Clears the in-flight flag however the capture ends.
struct FlightGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

pub(crate) struct LoopContext {
    pub shared: Arc<EngineShared>,
    pub link: SessionLink,
    pub mode: SessionMode,
    pub cadence: Cadence,
    pub trigger: Arc<Notify>,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Owns the device for the session's lifetime; the grabber is dropped (and the device
/// released) when the loop exits.
pub(crate) async fn capture_loop(ctx: LoopContext, mut grabber: Box<dyn FrameGrabber>) {
    // First capture lands one full period after start.
    let mut ticker = match ctx.cadence {
        Cadence::Every(period) => {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(ticker)
        }
        Cadence::Manual => None,
    };

    loop {
        tokio::select! {
            biased;
            _ = ctx.link.cancel_token.cancelled() => {
                log_info!("capture loop for {} (epoch {}) shutting down", ctx.mode.as_str(), ctx.link.epoch());
                break;
            }
            _ = next_tick(&mut ticker) => {}
            _ = ctx.trigger.notified() => {}
        }

        match run_tick(&ctx, grabber).await {
            Some(returned) => grabber = returned,
            None => break,
        }
    }
}

/// Hands the grabber back unless the capture worker died with it.
async fn run_tick(
    ctx: &LoopContext,
    grabber: Box<dyn FrameGrabber>,
) -> Option<Box<dyn FrameGrabber>> {
    ctx.shared.stats.tick();

    let Some(flight) = ctx.link.begin_flight() else {
        ctx.shared.stats.skipped();
        log_debug!("tick skipped, previous capture still in flight");
        return Some(grabber);
    };

    // Grabbing may hit the disk or the device driver.
    let grabbed = tokio::task::spawn_blocking(move || {
        let mut grabber = grabber;
        let captured = capture(grabber.as_mut());
        (grabber, captured)
    })
    .await;
    let (grabber, captured) = match grabbed {
        Ok(done) => done,
        Err(err) => {
            ctx.shared.stats.failed();
            log_error!("capture worker join failed: {err:?}");
            return None;
        }
    };

    match captured {
        Ok(frame) => {
            tokio::spawn(analyze_frame(
                Arc::clone(&ctx.shared),
                ctx.link.clone(),
                ctx.mode,
                frame,
                flight,
            ));
        }
        Err(err) => {
            ctx.shared.stats.failed();
            log_warn!("frame capture failed: {}", err);
        }
    }

    Some(grabber)
}

async fn analyze_frame(
    shared: Arc<EngineShared>,
    link: SessionLink,
    mode: SessionMode,
    frame: Frame,
    _flight: FlightGuard,
) {
    if mode.is_braille() {
        let mut guidance = shared.guidance.lock().await;
        if !link.is_current() {
            return;
        }
        let effects = guidance.braille.record_quality(frame.quality.label);
        if !effects.is_empty() {
            shared.note_effects(&effects);
            shared.publish_with(&guidance);
            drop(guidance);
            shared.perform(effects).await;
        }
    }

    let context = {
        let guidance = shared.guidance.lock().await;
        mode.context(&guidance)
    };

    let profile = mode.profile(&shared.settings.encode_quality);
    let encoded = match tokio::task::spawn_blocking(move || preprocess(&frame, profile)).await {
        Ok(Ok(encoded)) => encoded,
        Ok(Err(err)) => {
            shared.stats.failed();
            log_error!("{}", AnalysisError::Encode(err));
            shared.publish().await;
            return;
        }
        Err(err) => {
            shared.stats.failed();
            log_error!("preprocess worker join failed: {err:?}");
            shared.publish().await;
            return;
        }
    };

    let timeout = shared.settings.service.timeout();
    let reply = match describe(shared.client.as_ref(), &encoded, &context, timeout).await {
        Ok(reply) => reply,
        Err(EngineError::Malformed(err)) => {
            log_warn!("{}; treating as no signal", err);
            AnalysisReply::no_signal(&context)
        }
        Err(err) => {
            shared.stats.failed();
            log_warn!("analysis failed for epoch {}: {}", link.epoch(), err);
            shared.publish().await;
            return;
        }
    };

    apply_result(
        &shared,
        &link,
        AnalysisResult {
            reply,
            received_at: Utc::now(),
            session_epoch: link.epoch(),
        },
    )
    .await;
}

async fn apply_result(shared: &Arc<EngineShared>, link: &SessionLink, result: AnalysisResult) {
    let mut guidance = shared.guidance.lock().await;

    if !link.accepts(&result) {
        shared.stats.discarded();
        log_info!(
            "discarding result for stale epoch {} (received {})",
            result.session_epoch,
            result.received_at
        );
        shared.publish_with(&guidance);
        return;
    }

    let effects = guidance.apply(&result.reply, shared.extractor.as_ref());
    shared.stats.completed();

    if effects.contains(&GuidanceEffect::StopSession) {
        link.invalidate();
        shared.mark_stopped(link.epoch());
        log_info!("session at epoch {} finished by its own result", link.epoch());
    }

    shared.note_effects(&effects);
    shared.publish_with(&guidance);
    drop(guidance);

    shared.perform(effects).await;
}
