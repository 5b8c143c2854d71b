use serde::Serialize;
use std::collections::BTreeSet;

use crate::analysis::TrafficMode;
use crate::audio::ToneKind;
use crate::signals::{DangerLevel, TrafficLight, TrafficSignal};

use super::alerts::{AlertKind, AlertLog};
use super::GuidanceEffect;

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrafficState {
    pub mode: TrafficMode,
    pub danger_level: DangerLevel,
    pub vehicles: BTreeSet<String>,
    pub signs: BTreeSet<String>,
    pub crosswalk_detected: bool,
    /// Sticky: only an explicit new colour replaces it.
    pub traffic_light_state: Option<TrafficLight>,
    /// Sticky: only an explicit new verdict replaces it.
    pub safe_to_cross: Option<bool>,
    pub last_description: String,
}

#[derive(Debug, Default)]
pub struct TrafficFsm {
    state: TrafficState,
    /// Last crossing verdict spoken in the current mode.
    announced_verdict: Option<bool>,
}

impl TrafficFsm {
    pub fn state(&self) -> &TrafficState {
        &self.state
    }

    pub fn mode(&self) -> TrafficMode {
        self.state.mode
    }

    /// Fresh readings for a new traffic session in `mode`.
    pub fn begin(&mut self, mode: TrafficMode) {
        self.state = TrafficState {
            mode,
            ..TrafficState::default()
        };
        self.announced_verdict = None;
    }

    pub fn set_mode(&mut self, mode: TrafficMode) -> Vec<GuidanceEffect> {
        self.state.mode = mode;
        self.announced_verdict = None;

        let message = match mode {
            TrafficMode::Crossing => {
                "Modo atravessia ativado. Aponte a câmera para a rua. O sistema verificará se é seguro atravessar."
            }
            TrafficMode::Navigation => {
                "Modo navegação ativado. O sistema alertará sobre veículos e obstáculos próximos."
            }
        };
        vec![GuidanceEffect::Narrate(message.to_string())]
    }

    pub fn tick(
        &mut self,
        signal: &TrafficSignal,
        description: &str,
        alerts: &mut AlertLog,
    ) -> Vec<GuidanceEffect> {
        let previous = self.state.danger_level;
        let level = signal.danger_level;

        self.state.danger_level = level;
        self.state.vehicles = signal.vehicles.clone();
        self.state.signs = signal.signs.clone();
        self.state.crosswalk_detected = signal.crosswalk_detected;
        if let Some(light) = signal.traffic_light {
            self.state.traffic_light_state = Some(light);
        }
        if let Some(verdict) = signal.safe_to_cross {
            self.state.safe_to_cross = Some(verdict);
        }
        self.state.last_description = description.to_string();

        let escalated = level != previous && level.is_alarming();
        if !description.is_empty() {
            let kind = if escalated {
                AlertKind::Escalation
            } else {
                AlertKind::Observation
            };
            alerts.push(kind, level, description);
        }

        let mut effects = Vec::new();
        if escalated {
            let (tone, prefix) = if level == DangerLevel::Critical {
                (ToneKind::Critical, "ALERTA CRÍTICO!")
            } else {
                (ToneKind::Danger, "ATENÇÃO!")
            };
            effects.push(GuidanceEffect::Tone(tone));
            effects.push(GuidanceEffect::Narrate(format!("{prefix} {description}")));
        }

        if self.state.mode == TrafficMode::Crossing {
            if let Some(verdict) = self.state.safe_to_cross {
                if self.announced_verdict != Some(verdict) {
                    self.announced_verdict = Some(verdict);
                    // An escalation already spoke this tick; the verdict is not repeated.
                    if !escalated {
                        let text = if verdict {
                            "Pode atravessar"
                        } else {
                            "Não atravesse"
                        };
                        effects.push(GuidanceEffect::Narrate(text.to_string()));
                    }
                }
            }
        }

        effects
    }
}
