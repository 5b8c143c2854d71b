//! Per-mode guidance state machines.
//!
//! Each machine is a pure transition over its own state: it consumes one signal and
//! returns the effects to perform, in order. Nothing in here touches audio, the clock
//! source of the tick, or the camera.

pub mod alerts;
pub mod braille;
pub mod search;
pub mod traffic;

pub use alerts::{AlertEvent, AlertKind, AlertLog};
pub use braille::{BrailleReader, BrailleReading, BrailleState};
pub use search::{SearchFsm, SearchLocation, SearchState, SearchStatus};
pub use traffic::{TrafficFsm, TrafficState};

use crate::analysis::AnalysisReply;
use crate::audio::{Direction, ToneKind};
use crate::signals::SignalExtractor;

#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceEffect {
    Narrate(String),
    Tone(ToneKind),
    /// Shown, not spoken. `direction` is `None` for the generic keep-looking hint.
    Hint {
        direction: Option<Direction>,
        text: &'static str,
    },
    /// The session that produced this result must not tick again.
    StopSession,
}

/// Everything the guidance layer remembers across ticks.
#[derive(Debug, Default)]
pub struct GuidanceState {
    pub search: SearchFsm,
    pub traffic: TrafficFsm,
    pub braille: BrailleReader,
    pub alerts: AlertLog,
}

impl GuidanceState {
    /// Route one validated reply to the machine for its mode.
    pub fn apply(
        &mut self,
        reply: &AnalysisReply,
        extractor: &dyn SignalExtractor,
    ) -> Vec<GuidanceEffect> {
        match reply {
            AnalysisReply::Search { description } => {
                let signal = extractor.search(description);
                self.search.tick(&signal)
            }
            AnalysisReply::Traffic { description } => {
                let signal = extractor.traffic(description);
                self.traffic.tick(&signal, description, &mut self.alerts)
            }
            AnalysisReply::Braille {
                braille_text,
                translated_text,
            } => self.braille.read(braille_text, translated_text),
        }
    }
}
