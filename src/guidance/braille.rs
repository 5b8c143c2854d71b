use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::capture::QualityLabel;

use super::GuidanceEffect;

const MAX_HISTORY: usize = 10;

const NOTHING_READ: &str = "Nenhum Braille detectado. Ajuste a posição e iluminação.";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BrailleReading {
    pub braille_text: String,
    pub translated_text: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrailleState {
    pub last: Option<BrailleReading>,
    /// Newest first.
    pub history: VecDeque<BrailleReading>,
    pub quality: Option<QualityLabel>,
}

#[derive(Debug, Default)]
pub struct BrailleReader {
    state: BrailleState,
}

impl BrailleReader {
    pub fn state(&self) -> &BrailleState {
        &self.state
    }

    /// Record the raw capture quality; poor captures get a spoken warning.
    pub fn record_quality(&mut self, label: QualityLabel) -> Vec<GuidanceEffect> {
        self.state.quality = Some(label);
        label
            .warning()
            .map(|warning| vec![GuidanceEffect::Narrate(warning.to_string())])
            .unwrap_or_default()
    }

    pub fn read(&mut self, braille_text: &str, translated_text: &str) -> Vec<GuidanceEffect> {
        if translated_text.is_empty() && braille_text.is_empty() {
            return vec![GuidanceEffect::Narrate(NOTHING_READ.to_string())];
        }

        let reading = BrailleReading {
            braille_text: braille_text.to_string(),
            translated_text: translated_text.to_string(),
            read_at: Utc::now(),
        };
        self.state.last = Some(reading.clone());
        self.state.history.push_front(reading);
        self.state.history.truncate(MAX_HISTORY);

        if translated_text.is_empty() {
            return vec![GuidanceEffect::Narrate(NOTHING_READ.to_string())];
        }
        vec![GuidanceEffect::Narrate(format!(
            "Braille lido com sucesso. Texto: {translated_text}"
        ))]
    }
}
