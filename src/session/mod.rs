pub mod controller;
mod loop_worker;
pub mod state;

pub use controller::CaptureScheduler;
pub use state::{
    Cadence, CaptureSession, SchedulerStats, SessionMode, SessionStatus, StatsSnapshot,
};
