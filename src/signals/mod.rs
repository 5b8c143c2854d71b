//! Structured signals read out of the service's free-text descriptions.
//!
//! The state machines only ever see [`SearchSignal`] / [`TrafficSignal`], so the
//! heuristic reader in [`keywords`] can be swapped for structured service output
//! without touching them.

pub mod keywords;

use serde::Serialize;
use std::collections::BTreeSet;

pub use keywords::KeywordExtractor;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Horizontal {
    Esquerda,
    Direita,
}

impl Horizontal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizontal::Esquerda => "esquerda",
            Horizontal::Direita => "direita",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    Superior,
    Inferior,
}

impl Vertical {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vertical::Superior => "superior",
            Vertical::Inferior => "inferior",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceBand {
    Near,
    Medium,
    Far,
}

impl DistanceBand {
    /// Spoken form.
    pub fn label(&self) -> &'static str {
        match self {
            DistanceBand::Near => "perto",
            DistanceBand::Medium => "média distância",
            DistanceBand::Far => "longe",
        }
    }
}

/// Verbatim `POSIÇÃO:` / `DISTÂNCIA:` / `NAVEGAÇÃO:` lines, when the service sends them.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchDetails {
    pub position: Option<String>,
    pub distance: Option<String>,
    pub navigation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSignal {
    pub found: bool,
    pub horizontal: Option<Horizontal>,
    pub vertical: Option<Vertical>,
    pub distance_band: Option<DistanceBand>,
    pub details: SearchDetails,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum DangerLevel {
    #[default]
    Safe,
    Caution,
    Danger,
    Critical,
}

impl DangerLevel {
    pub fn is_alarming(self) -> bool {
        matches!(self, DangerLevel::Danger | DangerLevel::Critical)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLight {
    Red,
    Yellow,
    Green,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficSignal {
    pub danger_level: DangerLevel,
    pub vehicles: BTreeSet<String>,
    pub signs: BTreeSet<String>,
    pub crosswalk_detected: bool,
    /// `None` means the description said nothing about the light.
    pub traffic_light: Option<TrafficLight>,
    /// `None` means no verdict either way.
    pub safe_to_cross: Option<bool>,
}

pub trait SignalExtractor: Send + Sync {
    fn search(&self, description: &str) -> SearchSignal;

    fn traffic(&self, description: &str) -> TrafficSignal;
}
