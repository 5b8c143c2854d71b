use chrono::Utc;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::engine::EngineShared;
use crate::error::CaptureDeviceError;

use super::loop_worker::{capture_loop, LoopContext, SessionLink};
use super::state::{CaptureSession, SessionMode, SessionStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

struct ActiveLoop {
    handle: JoinHandle<()>,
    link: SessionLink,
    trigger: Arc<Notify>,
    mode: SessionMode,
}

/// Owns the one capture loop that may run at a time.
pub struct CaptureScheduler {
    shared: Arc<EngineShared>,
    epoch: Arc<AtomicU64>,
    active: Mutex<Option<ActiveLoop>>,
}

impl CaptureScheduler {
    pub(crate) fn new(shared: Arc<EngineShared>) -> Self {
        Self {
            shared,
            epoch: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Stop whatever is running, open the camera and start ticking in `mode`.
    /// If the camera cannot be opened the session stays idle.
    pub async fn start(&self, mode: SessionMode) -> Result<CaptureSession, CaptureDeviceError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.shutdown(previous).await;
        }

        let cadence = mode.cadence(&self.shared.settings.cadence);
        let grabber = match self.shared.camera.open() {
            Ok(grabber) => grabber,
            Err(err) => {
                log_warn!(
                    "cannot start {} session on {}: {}",
                    mode.as_str(),
                    self.shared.camera.name(),
                    err
                );
                self.shared.set_session(Some(CaptureSession {
                    id: Uuid::new_v4().to_string(),
                    mode,
                    cadence_ms: cadence.as_millis(),
                    status: SessionStatus::Idle,
                    epoch: self.current_epoch(),
                    started_at: Utc::now(),
                }));
                return Err(err);
            }
        };

        let epoch = {
            let _guidance = self.shared.guidance.lock().await;
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.shared.stats.reset();
        let session = CaptureSession {
            id: Uuid::new_v4().to_string(),
            mode,
            cadence_ms: cadence.as_millis(),
            status: SessionStatus::Running,
            epoch,
            started_at: Utc::now(),
        };
        self.shared.set_session(Some(session.clone()));

        let link = SessionLink::new(epoch, Arc::clone(&self.epoch));
        let trigger = Arc::new(Notify::new());
        let handle = tokio::spawn(capture_loop(
            LoopContext {
                shared: Arc::clone(&self.shared),
                link: link.clone(),
                mode,
                cadence,
                trigger: Arc::clone(&trigger),
            },
            grabber,
        ));

        log_info!(
            "started {} session {} at epoch {} ({:?})",
            mode.as_str(),
            session.id,
            epoch,
            cadence
        );

        *active = Some(ActiveLoop {
            handle,
            link,
            trigger,
            mode,
        });
        Ok(session)
    }

    /// Stop the running session and wait for its loop to release the camera.
    /// Returns the stopped session, or `None` if nothing was running.
    pub async fn stop(&self) -> Option<CaptureSession> {
        let previous = self.active.lock().await.take()?;
        self.shutdown(previous).await;
        self.shared.session()
    }

    async fn shutdown(&self, active: ActiveLoop) {
        {
            let _guidance = self.shared.guidance.lock().await;
            active.link.invalidate();
        }
        self.shared.mark_stopped(active.link.epoch());

        if let Err(err) = active.handle.await {
            log_error!("capture loop task failed to join: {err:?}");
        }
        log_info!(
            "{} session at epoch {} stopped",
            active.mode.as_str(),
            active.link.epoch()
        );
    }

    /// Ask the running session for one capture now. `false` when nothing is running.
    pub async fn trigger(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(active) if !active.link.is_cancelled() => {
                active.trigger.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Mode of the session still ticking, if any.
    pub async fn active_mode(&self) -> Option<SessionMode> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|active| !active.link.is_cancelled())
            .map(|active| active.mode)
    }
}
