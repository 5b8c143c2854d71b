use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedDescription;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrafficMode {
    #[default]
    Navigation,
    Crossing,
}

impl TrafficMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficMode::Navigation => "navigation",
            TrafficMode::Crossing => "crossing",
        }
    }
}

/// What the service is asked to look for on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeContext {
    Search { query: String },
    Traffic { mode: TrafficMode },
    Braille,
}

impl ModeContext {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ModeContext::Search { .. } => "analyze-frame",
            ModeContext::Traffic { .. } => "traffic-safety",
            ModeContext::Braille => "read-braille",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DescribeRequest<'a> {
    pub image_data: String,
    pub detection_type: &'static str,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
}

impl<'a> DescribeRequest<'a> {
    pub fn new(image_data: String, context: &'a ModeContext) -> Self {
        match context {
            ModeContext::Search { query } => Self {
                image_data,
                detection_type: "cloud",
                source: "search",
                search_query: Some(query.as_str()),
                mode: None,
            },
            ModeContext::Traffic { mode } => Self {
                image_data,
                detection_type: "traffic",
                source: "traffic_safety",
                search_query: None,
                mode: Some(mode.as_str()),
            },
            ModeContext::Braille => Self {
                image_data,
                detection_type: "cloud",
                source: "braille_reader",
                search_query: None,
                mode: None,
            },
        }
    }
}

/// Response body as the service sends it; every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawReply {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub braille_text: Option<String>,
    #[serde(default)]
    pub translated_text: Option<String>,
}

/// Validated, mode-tagged reply handed to the extractor and state machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisReply {
    Search { description: String },
    Traffic { description: String },
    Braille {
        braille_text: String,
        translated_text: String,
    },
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl RawReply {
    pub fn validate(self, context: &ModeContext) -> Result<AnalysisReply, MalformedDescription> {
        match context {
            ModeContext::Search { .. } => non_blank(self.description)
                .map(|description| AnalysisReply::Search { description })
                .ok_or_else(|| MalformedDescription("search reply without description".into())),
            ModeContext::Traffic { .. } => non_blank(self.description)
                .map(|description| AnalysisReply::Traffic { description })
                .ok_or_else(|| MalformedDescription("traffic reply without description".into())),
            ModeContext::Braille => {
                let braille_text = non_blank(self.braille_text).unwrap_or_default();
                let translated_text = non_blank(self.translated_text)
                    .or_else(|| non_blank(self.description))
                    .unwrap_or_default();
                Ok(AnalysisReply::Braille {
                    braille_text,
                    translated_text,
                })
            }
        }
    }
}

impl AnalysisReply {
    /// Reply standing in for a malformed one: carries no evidence at all.
    pub fn no_signal(context: &ModeContext) -> Self {
        match context {
            ModeContext::Search { .. } => AnalysisReply::Search {
                description: String::new(),
            },
            ModeContext::Traffic { .. } => AnalysisReply::Traffic {
                description: String::new(),
            },
            ModeContext::Braille => AnalysisReply::Braille {
                braille_text: String::new(),
                translated_text: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub reply: AnalysisReply,
    pub received_at: DateTime<Utc>,
    pub session_epoch: u64,
}
