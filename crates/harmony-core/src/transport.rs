//! Transport clock and playback state

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarmonyError, Result};

/// Scheduler playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    /// Tearing down a session (stop or supersede in progress)
    Stopping,
}

/// Slowest accepted tempo
pub const MIN_BPM: f64 = 1.0;
/// Fastest accepted tempo
pub const MAX_BPM: f64 = 10_000.0;

/// Tempo in BPM, within [`MIN_BPM`, `MAX_BPM`]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tempo(f64);

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self> {
        if (MIN_BPM..=MAX_BPM).contains(&bpm) {
            Ok(Self(bpm))
        } else {
            Err(HarmonyError::InvalidTempo(bpm))
        }
    }

    pub fn bpm(&self) -> f64 {
        self.0
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.0
    }

    /// Wall-clock length of `beats` at this tempo. Negative or NaN beats
    /// give zero, and lengths past `Duration::MAX` saturate.
    pub fn beats_to_duration(&self, beats: f64) -> Duration {
        let secs = (beats * self.seconds_per_beat()).max(0.0);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(120.0)
    }
}

impl TryFrom<f64> for Tempo {
    type Error = HarmonyError;

    fn try_from(bpm: f64) -> Result<Self> {
        Self::new(bpm)
    }
}

impl From<Tempo> for f64 {
    fn from(tempo: Tempo) -> Self {
        tempo.0
    }
}

/// Shared timing reference for one session.
///
/// Positions are computed from the origin, never accumulated, so everything
/// scheduled against the same clock stays aligned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportClock {
    origin: Duration,
    tempo: Tempo,
}

impl TransportClock {
    pub fn new(origin: Duration, tempo: Tempo) -> Self {
        Self { origin, tempo }
    }

    pub fn origin(&self) -> Duration {
        self.origin
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Absolute time of a beat position
    pub fn at_beat(&self, beats: f64) -> Duration {
        self.origin.saturating_add(self.tempo.beats_to_duration(beats))
    }

    /// Beat position at an absolute time (0 before the origin)
    pub fn beat_at(&self, time: Duration) -> f64 {
        time.saturating_sub(self.origin).as_secs_f64() / self.tempo.seconds_per_beat()
    }
}

/// Fraction of a chord's slot that its notes sound for, in `(0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Articulation(f64);

impl Articulation {
    pub const LEGATO: Self = Self(1.0);
    pub const DETACHED: Self = Self(0.5);

    pub fn new(ratio: f64) -> Result<Self> {
        if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
            Ok(Self(ratio))
        } else {
            Err(HarmonyError::InvalidArticulation(ratio))
        }
    }

    pub fn ratio(&self) -> f64 {
        self.0
    }

    /// Sounding length for a slot of the given length
    pub fn apply(&self, slot: Duration) -> Duration {
        slot.mul_f64(self.0)
    }
}

impl Default for Articulation {
    fn default() -> Self {
        Self::LEGATO
    }
}

impl TryFrom<f64> for Articulation {
    type Error = HarmonyError;

    fn try_from(ratio: f64) -> Result<Self> {
        Self::new(ratio)
    }
}

impl From<Articulation> for f64 {
    fn from(articulation: Articulation) -> Self {
        articulation.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tempo_validation() {
        assert!(Tempo::new(120.0).is_ok());
        assert_eq!(Tempo::new(0.0), Err(HarmonyError::InvalidTempo(0.0)));
        assert!(Tempo::new(-60.0).is_err());
        assert!(Tempo::new(f64::NAN).is_err());
        assert!(Tempo::new(f64::INFINITY).is_err());
        assert!(Tempo::new(MIN_BPM).is_ok());
        assert!(Tempo::new(MAX_BPM).is_ok());
        assert_eq!(Tempo::new(1e-20), Err(HarmonyError::InvalidTempo(1e-20)));
        assert!(Tempo::new(1e20).is_err());
    }

    #[test]
    fn test_beats_to_duration() {
        let tempo = Tempo::new(120.0).unwrap();
        assert_eq!(tempo.beats_to_duration(2.0), Duration::from_secs(1));
        assert_eq!(tempo.beats_to_duration(4.0), Duration::from_secs(2));
        assert_relative_eq!(Tempo::new(90.0).unwrap().seconds_per_beat(), 2.0 / 3.0);
    }

    #[test]
    fn test_huge_beat_counts_saturate() {
        let tempo = Tempo::new(MIN_BPM).unwrap();
        assert_eq!(tempo.beats_to_duration(1e20), Duration::MAX);
        assert_eq!(tempo.beats_to_duration(f64::INFINITY), Duration::MAX);
        assert_eq!(tempo.beats_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(tempo.beats_to_duration(-4.0), Duration::ZERO);

        let clock = TransportClock::new(Duration::from_secs(10), tempo);
        assert_eq!(clock.at_beat(1e20), Duration::MAX);
    }

    #[test]
    fn test_clock_positions_from_origin() {
        let clock = TransportClock::new(Duration::from_millis(250), Tempo::new(120.0).unwrap());
        assert_eq!(clock.at_beat(0.0), Duration::from_millis(250));
        assert_eq!(clock.at_beat(3.0), Duration::from_millis(1750));
        assert_relative_eq!(clock.beat_at(Duration::from_millis(1250)), 2.0);
        assert_eq!(clock.beat_at(Duration::ZERO), 0.0);
    }

    #[test]
    fn test_clock_does_not_drift() {
        // 1000 eighth notes at an awkward tempo land exactly where 500 beats do
        let clock = TransportClock::new(Duration::ZERO, Tempo::new(97.0).unwrap());
        let stepped = (0..=1000).map(|step| clock.at_beat(step as f64 * 0.5)).last();
        assert_eq!(stepped, Some(clock.at_beat(500.0)));
    }

    #[test]
    fn test_articulation() {
        let slot = Duration::from_secs(1);
        assert_eq!(Articulation::default().apply(slot), slot);
        assert_eq!(Articulation::DETACHED.apply(slot), Duration::from_millis(500));
        assert!(Articulation::new(0.0).is_err());
        assert!(Articulation::new(1.5).is_err());
    }

    #[test]
    fn test_tempo_serde() {
        let tempo: Tempo = serde_json::from_str("140").unwrap();
        assert_eq!(tempo.bpm(), 140.0);
        assert!(serde_json::from_str::<Tempo>("0").is_err());
    }
}
