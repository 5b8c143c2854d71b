use serde::Serialize;

use crate::audio::{Direction, ToneKind};
use crate::error::EngineError;
use crate::signals::{DistanceBand, Horizontal, SearchDetails, SearchSignal, Vertical};

use super::GuidanceEffect;

const RECENT_QUERIES: usize = 5;

const INITIAL_GUIDANCE: &str = "Movimente a câmera lentamente em todas as direções.";
const KEEP_LOOKING: &str = "Procurando... Continue movimentando a câmera.";

/// Hints on a fixed attempt schedule. Attempts past the last entry get none.
const HINT_SCHEDULE: &[(u32, Option<Direction>, &str)] = &[
    (3, Some(Direction::Left), "Tente virar a câmera para a esquerda."),
    (6, Some(Direction::Right), "Tente virar a câmera para a direita."),
    (9, Some(Direction::Up), "Tente apontar para cima."),
    (12, Some(Direction::Down), "Tente apontar para baixo."),
    (15, None, KEEP_LOOKING),
];

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SearchStatus {
    #[default]
    Idle,
    Searching,
    Found,
    Stopped,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchLocation {
    pub horizontal: Option<Horizontal>,
    pub vertical: Option<Vertical>,
}

impl SearchLocation {
    pub fn label(&self) -> String {
        match (self.horizontal, self.vertical) {
            (Some(h), Some(v)) => format!("{} {}", h.as_str(), v.as_str()),
            (Some(h), None) => h.as_str().to_string(),
            (None, Some(v)) => v.as_str().to_string(),
            (None, None) => "centro".to_string(),
        }
    }
}

impl From<&SearchSignal> for SearchLocation {
    fn from(signal: &SearchSignal) -> Self {
        Self {
            horizontal: signal.horizontal,
            vertical: signal.vertical,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchState {
    pub query: String,
    pub attempts: u32,
    pub status: SearchStatus,
    pub location: Option<SearchLocation>,
    pub distance_band: Option<DistanceBand>,
    pub guidance: Option<String>,
    pub details: SearchDetails,
    /// Most recent first.
    pub recent_queries: Vec<String>,
}

#[derive(Debug, Default)]
pub struct SearchFsm {
    state: SearchState,
}

impl SearchFsm {
    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn is_searching(&self) -> bool {
        self.state.status == SearchStatus::Searching
    }

    /// Begin (or restart) a search. Blank queries leave the state untouched.
    pub fn start(&mut self, query: &str) -> Result<Vec<GuidanceEffect>, EngineError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::InvalidQuery);
        }

        let recent_queries = remember(&self.state.recent_queries, query);
        self.state = SearchState {
            query: query.to_string(),
            status: SearchStatus::Searching,
            guidance: Some(INITIAL_GUIDANCE.to_string()),
            recent_queries,
            ..SearchState::default()
        };

        Ok(vec![GuidanceEffect::Narrate(format!(
            "Iniciando busca por: {query}. Movimente a câmera lentamente para procurar."
        ))])
    }

    /// Undo a `start` whose session never came up.
    pub fn abort(&mut self) {
        if self.is_searching() {
            self.state.status = SearchStatus::Idle;
            self.state.guidance = None;
        }
    }

    pub fn tick(&mut self, signal: &SearchSignal) -> Vec<GuidanceEffect> {
        if !self.is_searching() {
            return Vec::new();
        }

        if signal.found {
            let location = SearchLocation::from(signal);
            let band = signal.distance_band.unwrap_or(DistanceBand::Near);

            self.state.status = SearchStatus::Found;
            self.state.location = Some(location);
            self.state.distance_band = Some(band);
            self.state.details = signal.details.clone();
            self.state.guidance = signal.details.navigation.clone();

            return vec![
                GuidanceEffect::StopSession,
                GuidanceEffect::Tone(ToneKind::Success),
                GuidanceEffect::Narrate(format!(
                    "{} encontrado. Posição: {}. Distância: {}.",
                    self.state.query,
                    location.label(),
                    band.label()
                )),
            ];
        }

        self.state.attempts += 1;
        let attempts = self.state.attempts;

        let Some((_, direction, text)) = HINT_SCHEDULE.iter().find(|(at, _, _)| *at == attempts)
        else {
            return Vec::new();
        };

        self.state.guidance = Some(text.to_string());
        let mut effects = vec![GuidanceEffect::Hint {
            direction: *direction,
            text: *text,
        }];
        if let Some(direction) = direction {
            effects.push(GuidanceEffect::Tone(ToneKind::Directional(*direction)));
        }
        effects
    }

    pub fn stop(&mut self) -> Vec<GuidanceEffect> {
        if !self.is_searching() {
            return Vec::new();
        }

        self.state.status = SearchStatus::Stopped;
        self.state.attempts = 0;
        self.state.location = None;
        self.state.distance_band = None;
        self.state.guidance = None;
        vec![GuidanceEffect::Narrate("Busca interrompida.".to_string())]
    }

    /// Back to Idle from Found or Stopped. The query history survives.
    pub fn reset(&mut self) -> Vec<GuidanceEffect> {
        if !matches!(
            self.state.status,
            SearchStatus::Found | SearchStatus::Stopped
        ) {
            return Vec::new();
        }

        self.state = SearchState {
            recent_queries: std::mem::take(&mut self.state.recent_queries),
            ..SearchState::default()
        };
        vec![GuidanceEffect::Narrate("Digite o que você procura.".to_string())]
    }
}

fn remember(previous: &[String], query: &str) -> Vec<String> {
    std::iter::once(query.to_string())
        .chain(previous.iter().filter(|q| q.as_str() != query).cloned())
        .take(RECENT_QUERIES)
        .collect()
}
