use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::analysis::{ModeContext, TrafficMode};
use crate::capture::PreprocessProfile;
use crate::guidance::GuidanceState;
use crate::settings::{CadenceSettings, EncodeSettings};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SessionMode {
    Search,
    TrafficNavigation,
    TrafficCrossing,
    BrailleSingle,
    BrailleContinuous,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Search => "search",
            SessionMode::TrafficNavigation => "traffic-navigation",
            SessionMode::TrafficCrossing => "traffic-crossing",
            SessionMode::BrailleSingle => "braille-single",
            SessionMode::BrailleContinuous => "braille-continuous",
        }
    }

    pub fn traffic(mode: TrafficMode) -> Self {
        match mode {
            TrafficMode::Navigation => SessionMode::TrafficNavigation,
            TrafficMode::Crossing => SessionMode::TrafficCrossing,
        }
    }

    pub fn traffic_mode(&self) -> Option<TrafficMode> {
        match self {
            SessionMode::TrafficNavigation => Some(TrafficMode::Navigation),
            SessionMode::TrafficCrossing => Some(TrafficMode::Crossing),
            _ => None,
        }
    }

    pub fn is_braille(&self) -> bool {
        matches!(self, SessionMode::BrailleSingle | SessionMode::BrailleContinuous)
    }

    pub fn cadence(&self, settings: &CadenceSettings) -> Cadence {
        let every = |ms: u64| Cadence::Every(Duration::from_millis(ms.max(1)));
        match self {
            SessionMode::Search => every(settings.search_ms),
            SessionMode::TrafficNavigation => every(settings.navigation_ms),
            SessionMode::TrafficCrossing => every(settings.crossing_ms),
            SessionMode::BrailleSingle => Cadence::Manual,
            SessionMode::BrailleContinuous => every(settings.braille_continuous_ms),
        }
    }

    /// Braille frames get the contrast stretch; everything else goes out as captured.
    pub fn profile(&self, quality: &EncodeSettings) -> PreprocessProfile {
        match self {
            SessionMode::Search => PreprocessProfile {
                enhance_contrast: false,
                encode_quality: quality.search,
            },
            SessionMode::TrafficNavigation | SessionMode::TrafficCrossing => PreprocessProfile {
                enhance_contrast: false,
                encode_quality: quality.traffic,
            },
            SessionMode::BrailleSingle | SessionMode::BrailleContinuous => PreprocessProfile {
                enhance_contrast: true,
                encode_quality: quality.braille,
            },
        }
    }

    /// What to ask the service for, given the current guidance state.
    pub fn context(&self, guidance: &GuidanceState) -> ModeContext {
        match self {
            SessionMode::Search => ModeContext::Search {
                query: guidance.search.state().query.clone(),
            },
            SessionMode::TrafficNavigation | SessionMode::TrafficCrossing => ModeContext::Traffic {
                mode: self.traffic_mode().unwrap_or_default(),
            },
            SessionMode::BrailleSingle | SessionMode::BrailleContinuous => ModeContext::Braille,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// One capture per explicit trigger.
    Manual,
    Every(Duration),
}

impl Cadence {
    pub fn as_millis(&self) -> Option<u64> {
        match self {
            Cadence::Manual => None,
            Cadence::Every(period) => Some(period.as_millis() as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub id: String,
    pub mode: SessionMode,
    /// `None` for manually triggered sessions.
    pub cadence_ms: Option<u64>,
    pub status: SessionStatus,
    pub epoch: u64,
    pub started_at: DateTime<Utc>,
}

/// Per-session tick accounting, reset on every start.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    skipped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub ticks: u64,
    /// Ticks that found a capture still in flight.
    pub skipped: u64,
    pub completed: u64,
    pub failed: u64,
    /// Results that arrived for an epoch that was no longer current.
    pub discarded: u64,
}

impl SchedulerStats {
    pub fn reset(&self) {
        for counter in [
            &self.ticks,
            &self.skipped,
            &self.completed,
            &self.failed,
            &self.discarded,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}
