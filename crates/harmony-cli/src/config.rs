use std::path::{Path, PathBuf};

use harmony_core::{DrumPattern, Mode};
use harmony_services::generation::DEFAULT_URL;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tempo: f64,
    pub articulation: f64,
    pub drums: bool,
    pub pattern: DrumPattern,
    pub tonic: String,
    pub mode: Mode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            articulation: 1.0,
            drums: true,
            pattern: DrumPattern::Basic,
            tonic: "C".into(),
            mode: Mode::Major,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub master_db: f32,
    pub cutoff_hz: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            master_db: 0.0,
            cutoff_hz: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub sample_rate: u32,
    pub tail_secs: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tail_secs: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub url: String,
    pub seed: String,
    pub length: usize,
    pub temperature: Option<f64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            seed: "I".into(),
            length: 8,
            temperature: None,
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("harmony")
        .join("config.toml")
}

/// Read the config at `path`. A missing or unreadable file gives the defaults.
pub fn load_config(path: &Path) -> AppConfig {
    let Ok(text) = std::fs::read_to_string(path) else {
        return AppConfig::default();
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring invalid config");
            AppConfig::default()
        }
    }
}
