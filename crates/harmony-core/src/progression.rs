//! Chords, progressions and the payload shape produced by the generation service

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HarmonyError, Result};
use crate::percussion::DrumConfig;
use crate::pitch::{resolve_symbol_to_pitches, Mode, Pitch, Tonic};
use crate::transport::Tempo;

/// Chord length used when the payload leaves it out
pub const DEFAULT_CHORD_BEATS: f64 = 1.0;
pub const DEFAULT_TEMPO_BPM: f64 = 120.0;
/// Longest accepted chord, in beats
pub const MAX_CHORD_BEATS: f64 = 4096.0;

fn default_beats() -> f64 {
    DEFAULT_CHORD_BEATS
}

fn default_tempo() -> f64 {
    DEFAULT_TEMPO_BPM
}

fn check_duration(symbol: &str, duration: f64) -> Result<()> {
    if duration > 0.0 && duration <= MAX_CHORD_BEATS {
        Ok(())
    } else {
        Err(HarmonyError::InvalidDuration {
            symbol: symbol.to_string(),
            duration,
        })
    }
}

/// A chord with resolved pitches, ready to sound
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chord {
    pub symbol: String,
    pub pitches: Vec<Pitch>,
    /// Length in beats, in `(0, MAX_CHORD_BEATS]`
    pub duration: f64,
}

impl Chord {
    pub fn new(symbol: impl Into<String>, pitches: Vec<Pitch>, duration: f64) -> Result<Self> {
        let symbol = symbol.into();
        check_duration(&symbol, duration)?;
        Ok(Self { symbol, pitches, duration })
    }
}

/// A chord as it arrives at the boundary: explicit pitches, a symbol to
/// resolve against the key, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawChord")]
pub struct ChordSpec {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitches: Option<Vec<Pitch>>,
    pub duration: f64,
}

impl ChordSpec {
    pub fn symbolic(symbol: impl Into<String>, duration: f64) -> Self {
        Self {
            symbol: symbol.into(),
            pitches: None,
            duration,
        }
    }

    pub fn with_pitches(symbol: impl Into<String>, pitches: Vec<Pitch>, duration: f64) -> Self {
        Self {
            symbol: symbol.into(),
            pitches: Some(pitches),
            duration,
        }
    }

    /// Normalize to a [`Chord`]. Explicit pitches win over the symbol.
    pub fn resolve(&self, tonic: &Tonic) -> Result<Chord> {
        check_duration(&self.symbol, self.duration)?;
        let pitches = match &self.pitches {
            Some(pitches) if !pitches.is_empty() => pitches.clone(),
            _ => resolve_symbol_to_pitches(&self.symbol, tonic)?,
        };
        Ok(Chord {
            symbol: self.symbol.clone(),
            pitches,
            duration: self.duration,
        })
    }
}

/// Wire forms accepted for a chord
#[derive(Deserialize)]
#[serde(untagged)]
enum RawChord {
    Symbol(String),
    Full {
        #[serde(default, alias = "chord", alias = "name")]
        symbol: String,
        #[serde(default, alias = "notes")]
        pitches: Option<Vec<Pitch>>,
        #[serde(default = "default_beats")]
        duration: f64,
    },
}

impl From<RawChord> for ChordSpec {
    fn from(raw: RawChord) -> Self {
        match raw {
            RawChord::Symbol(symbol) => Self::symbolic(symbol, DEFAULT_CHORD_BEATS),
            RawChord::Full {
                symbol,
                pitches,
                duration,
            } => Self {
                symbol,
                pitches,
                duration,
            },
        }
    }
}

/// Progression payload as returned by the generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionPayload {
    #[serde(default, alias = "progression")]
    pub chords: Vec<ChordSpec>,
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    #[serde(default, alias = "key", skip_serializing_if = "Option::is_none")]
    pub tonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drums: Option<DrumConfig>,
}

impl Default for ProgressionPayload {
    fn default() -> Self {
        Self {
            chords: Vec::new(),
            tempo: DEFAULT_TEMPO_BPM,
            tonic: None,
            mode: None,
            drums: None,
        }
    }
}

/// Everything one playback session needs. The progression is shared
/// read-only with the scheduler for the life of the session.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub progression: Arc<[ChordSpec]>,
    pub tempo: Tempo,
    pub tonic: Tonic,
    pub drums: DrumConfig,
}

impl PlaybackRequest {
    pub fn new(progression: Vec<ChordSpec>, tempo: Tempo, tonic: Tonic, drums: DrumConfig) -> Self {
        Self {
            progression: progression.into(),
            tempo,
            tonic,
            drums,
        }
    }

    /// Validate tempo and key. Chord symbols are resolved later, per chord.
    pub fn from_payload(payload: ProgressionPayload) -> Result<Self> {
        let tempo = Tempo::new(payload.tempo)?;
        let mode = payload.mode.unwrap_or_default();
        let tonic = match payload.tonic.as_deref() {
            Some(name) => Tonic::parse(name, mode)?,
            None => Tonic::new(0, mode),
        };
        Ok(Self::new(
            payload.chords,
            tempo,
            tonic,
            payload.drums.unwrap_or_default(),
        ))
    }

    pub fn len(&self) -> usize {
        self.progression.len()
    }

    pub fn is_empty(&self) -> bool {
        self.progression.is_empty()
    }

    /// Length of the whole progression in beats
    pub fn total_beats(&self) -> f64 {
        self.progression.iter().map(|c| c.duration.max(0.0)).sum()
    }
}
