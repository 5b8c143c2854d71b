use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

pub const DEFAULT_SETTINGS_FILE: &str = "sightline.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceSettings {
    pub base_url: String,
    pub api_token: Option<String>,
    /// Client-side timeout applied to every analysis call.
    pub timeout_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".into(),
            api_token: None,
            timeout_ms: 4000,
        }
    }
}

impl ServiceSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct VoiceSettings {
    pub enabled: bool,
    pub lang: String,
    pub rate: f32,
    pub pitch: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            lang: "pt-BR".into(),
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CadenceSettings {
    pub search_ms: u64,
    pub navigation_ms: u64,
    pub crossing_ms: u64,
    pub braille_continuous_ms: u64,
}

impl Default for CadenceSettings {
    fn default() -> Self {
        Self {
            search_ms: 2000,
            navigation_ms: 2000,
            crossing_ms: 1500,
            braille_continuous_ms: 3000,
        }
    }
}

/// Lossy encode quality per mode, in `0.0..=1.0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EncodeSettings {
    pub search: f32,
    pub traffic: f32,
    pub braille: f32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            search: 0.7,
            traffic: 0.8,
            braille: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub service: ServiceSettings,
    pub voice: VoiceSettings,
    pub tones_enabled: bool,
    pub cadence: CadenceSettings,
    pub encode_quality: EncodeSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            service: ServiceSettings::default(),
            voice: VoiceSettings::default(),
            tones_enabled: true,
            cadence: CadenceSettings::default(),
            encode_quality: EncodeSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Apply `SIGHTLINE_SERVICE_URL` / `SIGHTLINE_API_TOKEN` on top of the stored values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SIGHTLINE_SERVICE_URL") {
            if !url.trim().is_empty() {
                self.service.base_url = url.trim().to_string();
            }
        }
        if let Ok(token) = std::env::var("SIGHTLINE_API_TOKEN") {
            if !token.trim().is_empty() {
                self.service.api_token = Some(token.trim().to_string());
            }
        }
        self
    }
}

/// `SIGHTLINE_DEBUG=1` (or `true`) turns on debug level logging.
pub fn debug_mode() -> bool {
    std::env::var("SIGHTLINE_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn settings_path() -> PathBuf {
    std::env::var("SIGHTLINE_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        self.read().clone()
    }

    pub fn update_voice(&self, voice: VoiceSettings) -> Result<()> {
        let mut guard = self.write();
        guard.voice = voice;
        self.persist(&guard)
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
