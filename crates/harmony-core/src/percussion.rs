//! Percussion patterns: step tables for the tempo-locked drum cycle

use serde::{Deserialize, Serialize};

/// A single percussion sound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumHit {
    Kick,
    Snare,
    ClosedHat,
    OpenHat,
    Ride,
}

impl DrumHit {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kick => "kick",
            Self::Snare => "snare",
            Self::ClosedHat => "closed hat",
            Self::OpenHat => "open hat",
            Self::Ride => "ride",
        }
    }
}

const BASIC: &[&[DrumHit]] = &[
    &[DrumHit::Kick],
    &[DrumHit::ClosedHat],
    &[DrumHit::Kick, DrumHit::Snare],
    &[DrumHit::ClosedHat],
];

// The open hat on the last eighth takes the closed hat's place; the two choke
// each other on the kit
const ROCK: &[&[DrumHit]] = &[
    &[DrumHit::Kick, DrumHit::ClosedHat],
    &[DrumHit::ClosedHat],
    &[DrumHit::Snare, DrumHit::ClosedHat],
    &[DrumHit::Kick, DrumHit::ClosedHat],
    &[DrumHit::Kick, DrumHit::ClosedHat],
    &[DrumHit::ClosedHat],
    &[DrumHit::Snare, DrumHit::ClosedHat],
    &[DrumHit::OpenHat],
];

const JAZZ: &[&[DrumHit]] = &[
    &[DrumHit::Ride, DrumHit::Kick],
    &[DrumHit::Ride, DrumHit::ClosedHat],
    &[DrumHit::Ride],
    &[DrumHit::Ride, DrumHit::ClosedHat],
];

/// Drum pattern selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrumPattern {
    #[default]
    Basic,
    Rock,
    Jazz,
}

impl DrumPattern {
    pub const ALL: [DrumPattern; 3] = [Self::Basic, Self::Rock, Self::Jazz];

    /// Hits for each step of one cycle
    pub fn steps(&self) -> &'static [&'static [DrumHit]] {
        match self {
            Self::Basic => BASIC,
            Self::Rock => ROCK,
            Self::Jazz => JAZZ,
        }
    }

    /// Length of one step in beats
    pub fn step_beats(&self) -> f64 {
        match self {
            Self::Basic | Self::Jazz => 1.0,
            Self::Rock => 0.5,
        }
    }

    pub fn len(&self) -> usize {
        self.steps().len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps().is_empty()
    }

    /// Hits for an absolute step count (wraps around the cycle)
    pub fn hits_at(&self, step: u64) -> &'static [DrumHit] {
        let steps = self.steps();
        steps[(step % steps.len() as u64) as usize]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Rock => "rock",
            Self::Jazz => "jazz",
        }
    }
}

impl std::str::FromStr for DrumPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown drum pattern {s:?} (expected basic, rock or jazz)"))
    }
}

/// Per-session drum settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DrumConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub pattern: DrumPattern,
}

impl DrumConfig {
    pub fn enabled(pattern: DrumPattern) -> Self {
        Self { enabled: true, pattern }
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}
