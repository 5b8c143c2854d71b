use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::signals::DangerLevel;

const MAX_ALERTS: usize = 10;
const MAX_MESSAGE_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    /// Every traffic reading.
    Observation,
    /// The level crossed into danger or critical.
    Escalation,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub kind: AlertKind,
    pub level: DangerLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded, newest-first log of traffic alerts for the current session.
#[derive(Debug, Default)]
pub struct AlertLog {
    events: VecDeque<AlertEvent>,
}

impl AlertLog {
    pub fn push(&mut self, kind: AlertKind, level: DangerLevel, message: &str) {
        self.events.push_front(AlertEvent {
            kind,
            level,
            message: message.chars().take(MAX_MESSAGE_CHARS).collect(),
            timestamp: Utc::now(),
        });
        self.events.truncate(MAX_ALERTS);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn latest(&self) -> Option<&AlertEvent> {
        self.events.front()
    }

    pub fn to_vec(&self) -> Vec<AlertEvent> {
        self.events.iter().cloned().collect()
    }
}
