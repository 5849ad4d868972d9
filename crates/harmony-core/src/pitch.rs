//! Pitch model: chromatic pitches, note names and scale-degree chord symbols

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HarmonyError, Result};

/// Sharp-spelled chromatic note names, indexed by pitch class
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Roman numerals for scale degrees 1-7
const DEGREE_NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// Pitch of the tonic when resolving scale-degree symbols (middle C octave)
pub const TONIC_BASE: i32 = 60;

/// Added to `floor(pitch / 12)` when naming notes. Keeps generated chords
/// in a low, warm register on the instrument.
pub const DISPLAY_OCTAVE_OFFSET: i32 = -2;

/// Absolute chromatic pitch in semitones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pitch(pub i32);

impl Pitch {
    pub const OCTAVE: i32 = 12;

    pub fn new(semitones: i32) -> Self {
        Self(semitones)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    /// Shift by whole octaves (negative = down)
    pub fn shift_octaves(self, octaves: i32) -> Self {
        self.transpose(octaves.saturating_mul(Self::OCTAVE))
    }

    pub fn transpose(self, semitones: i32) -> Self {
        Self(self.0.saturating_add(semitones))
    }

    /// Pitch class 0-11 (C = 0), also for negative pitches
    pub fn pitch_class(self) -> u8 {
        self.0.rem_euclid(Self::OCTAVE) as u8
    }

    /// Absolute distance in semitones
    pub fn distance(self, other: Pitch) -> u32 {
        self.0.abs_diff(other.0)
    }

    pub fn note_name(self) -> NoteName {
        pitch_to_note_name(self)
    }
}

impl From<i32> for Pitch {
    fn from(semitones: i32) -> Self {
        Self(semitones)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.note_name())
    }
}

/// Instrument-addressable note name, e.g. `C#3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteName {
    pub letter: &'static str,
    pub octave: i32,
}

impl NoteName {
    pub fn pitch_class(&self) -> u8 {
        NOTE_NAMES
            .iter()
            .position(|&name| name == self.letter)
            .unwrap_or(0) as u8
    }

    /// Frequency in Hz of the named note (A4 = 440 Hz)
    pub fn frequency(&self) -> f64 {
        let midi = (self.octave as f64 + 1.0) * 12.0 + self.pitch_class() as f64;
        440.0 * 2f64.powf((midi - 69.0) / 12.0)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.letter, self.octave)
    }
}

/// Convert a pitch to its note name. Total over all integers.
pub fn pitch_to_note_name(pitch: Pitch) -> NoteName {
    NoteName {
        letter: NOTE_NAMES[pitch.pitch_class() as usize],
        octave: pitch.0.div_euclid(Pitch::OCTAVE) + DISPLAY_OCTAVE_OFFSET,
    }
}

// ============================================================================
// Keys and chord qualities
// ============================================================================

/// Key mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    #[serde(alias = "M", alias = "Major")]
    Major,
    #[serde(alias = "m", alias = "Minor")]
    Minor,
}

impl Mode {
    /// Scale intervals (semitones from the tonic) for degrees I-VII
    pub fn intervals(&self) -> &'static [i32; 7] {
        match self {
            Self::Major => &[0, 2, 4, 5, 7, 9, 11],
            Self::Minor => &[0, 2, 3, 5, 7, 8, 10],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
        }
    }
}

impl FromStr for Mode {
    type Err = HarmonyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "M" | "maj" | "major" | "Major" => Ok(Self::Major),
            "m" | "min" | "minor" | "Minor" => Ok(Self::Minor),
            other => Err(HarmonyError::InvalidTonic(other.to_string())),
        }
    }
}

/// Triad quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
}

impl ChordQuality {
    /// Chord intervals from the root
    pub fn intervals(&self) -> &'static [i32; 3] {
        match self {
            Self::Major => &[0, 4, 7],
            Self::Minor => &[0, 3, 7],
            Self::Diminished => &[0, 3, 6],
        }
    }
}

/// Tonic pitch class and mode used to resolve scale-degree symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tonic {
    pub pitch_class: u8,
    pub mode: Mode,
}

impl Tonic {
    pub fn new(pitch_class: u8, mode: Mode) -> Self {
        Self {
            pitch_class: pitch_class % 12,
            mode,
        }
    }

    /// Parse a tonic name such as `C`, `F#` or `Bb`
    pub fn parse(name: &str, mode: Mode) -> Result<Self> {
        let invalid = || HarmonyError::InvalidTonic(name.to_string());
        let mut chars = name.trim().chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let natural: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };
        let accidental = match chars.as_str() {
            "" => 0,
            "#" => 1,
            "b" => -1,
            _ => return Err(invalid()),
        };
        Ok(Self::new((natural + accidental).rem_euclid(12) as u8, mode))
    }

    /// Pitch of the tonic in the resolution octave
    pub fn root(&self) -> Pitch {
        Pitch(TONIC_BASE + self.pitch_class as i32)
    }
}

impl fmt::Display for Tonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", NOTE_NAMES[self.pitch_class as usize], self.mode.name())
    }
}

// ============================================================================
// Scale-degree symbols
// ============================================================================

/// Resolve a roman-numeral symbol (`I`, `vi`, `bVII`, `vii°`) to a triad.
///
/// Upper-case numerals build a major third, lower-case a minor third, and a
/// `°`/`o`/`dim` suffix builds a diminished triad. Roots follow the tonic's
/// mode and sit in the octave starting at [`TONIC_BASE`].
pub fn resolve_symbol_to_pitches(symbol: &str, tonic: &Tonic) -> Result<Vec<Pitch>> {
    let invalid = || HarmonyError::InvalidSymbol(symbol.to_string());
    let mut body = symbol.trim();

    let mut accidental = 0;
    if let Some(rest) = body.strip_prefix('b') {
        accidental = -1;
        body = rest;
    } else if let Some(rest) = body.strip_prefix('#') {
        accidental = 1;
        body = rest;
    }

    let mut diminished = false;
    for suffix in ["°", "dim", "o"] {
        if let Some(rest) = body.strip_suffix(suffix) {
            diminished = true;
            body = rest;
            break;
        }
    }

    if body.is_empty() {
        return Err(invalid());
    }

    let upper = body.chars().all(|c| c.is_ascii_uppercase());
    let lower = body.chars().all(|c| c.is_ascii_lowercase());
    if !upper && !lower {
        return Err(invalid());
    }

    let numeral = body.to_ascii_uppercase();
    let degree = DEGREE_NUMERALS
        .iter()
        .position(|&n| n == numeral)
        .ok_or_else(invalid)?;

    let quality = match (diminished, upper) {
        (true, _) => ChordQuality::Diminished,
        (false, true) => ChordQuality::Major,
        (false, false) => ChordQuality::Minor,
    };

    let root = tonic
        .root()
        .transpose(tonic.mode.intervals()[degree] + accidental);

    Ok(quality
        .intervals()
        .iter()
        .map(|&interval| root.transpose(interval))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitches(values: &[i32]) -> Vec<Pitch> {
        values.iter().copied().map(Pitch).collect()
    }

    #[test]
    fn test_note_names() {
        assert_eq!(pitch_to_note_name(Pitch(60)).to_string(), "C3");
        assert_eq!(pitch_to_note_name(Pitch(61)).to_string(), "C#3");
        assert_eq!(pitch_to_note_name(Pitch(71)).to_string(), "B3");
        assert_eq!(pitch_to_note_name(Pitch(72)).to_string(), "C4");
    }

    #[test]
    fn test_note_names_are_total() {
        // Negative and extreme pitches still name a note
        assert_eq!(pitch_to_note_name(Pitch(-1)).to_string(), "B-3");
        assert_eq!(pitch_to_note_name(Pitch(-12)).to_string(), "C-3");
        for value in [i32::MIN, -13, 0, 11, 12, i32::MAX] {
            let name = pitch_to_note_name(Pitch(value));
            assert_eq!(name, pitch_to_note_name(Pitch(value)));
            assert_eq!(name.pitch_class(), Pitch(value).pitch_class());
        }
    }

    #[test]
    fn test_note_frequency() {
        // A4 names pitch 81 once the display offset is applied
        let a4 = Pitch(81).note_name();
        assert_eq!(a4.to_string(), "A4");
        assert!((a4.frequency() - 440.0).abs() < 1e-9);
        assert!((Pitch(60).note_name().frequency() - 130.8128).abs() < 1e-3);
    }

    #[test]
    fn test_octave_shift() {
        assert_eq!(Pitch(60).shift_octaves(1), Pitch(72));
        assert_eq!(Pitch(60).shift_octaves(-1), Pitch(48));
        assert_eq!(Pitch(i32::MAX).shift_octaves(1), Pitch(i32::MAX));
    }

    #[test]
    fn test_resolve_major_key() {
        let c = Tonic::default();
        assert_eq!(resolve_symbol_to_pitches("I", &c).unwrap(), pitches(&[60, 64, 67]));
        assert_eq!(resolve_symbol_to_pitches("ii", &c).unwrap(), pitches(&[62, 65, 69]));
        assert_eq!(resolve_symbol_to_pitches("V", &c).unwrap(), pitches(&[67, 71, 74]));
        assert_eq!(resolve_symbol_to_pitches("vi", &c).unwrap(), pitches(&[69, 72, 76]));
        assert_eq!(resolve_symbol_to_pitches("vii°", &c).unwrap(), pitches(&[71, 74, 77]));
    }

    #[test]
    fn test_resolve_case_sets_third() {
        let c = Tonic::default();
        assert_eq!(resolve_symbol_to_pitches("IV", &c).unwrap(), pitches(&[65, 69, 72]));
        assert_eq!(resolve_symbol_to_pitches("iv", &c).unwrap(), pitches(&[65, 68, 72]));
        // Plain lower-case vii keeps a perfect fifth
        assert_eq!(resolve_symbol_to_pitches("vii", &c).unwrap(), pitches(&[71, 74, 78]));
    }

    #[test]
    fn test_resolve_minor_key_and_accidentals() {
        let a_minor = Tonic::parse("A", Mode::Minor).unwrap();
        assert_eq!(resolve_symbol_to_pitches("i", &a_minor).unwrap(), pitches(&[69, 72, 76]));
        assert_eq!(resolve_symbol_to_pitches("III", &a_minor).unwrap(), pitches(&[72, 76, 79]));

        let c = Tonic::default();
        assert_eq!(resolve_symbol_to_pitches("bVII", &c).unwrap(), pitches(&[70, 74, 77]));
        assert_eq!(resolve_symbol_to_pitches("#iv", &c).unwrap(), pitches(&[66, 69, 73]));
    }

    #[test]
    fn test_resolve_invalid_symbol() {
        let c = Tonic::default();
        for symbol in ["", "VIII", "X", "Iv", "b", "°", "Cmaj7"] {
            assert_eq!(
                resolve_symbol_to_pitches(symbol, &c),
                Err(HarmonyError::InvalidSymbol(symbol.to_string())),
                "{symbol:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_tonic_parse() {
        assert_eq!(Tonic::parse("C", Mode::Major).unwrap().pitch_class, 0);
        assert_eq!(Tonic::parse("F#", Mode::Major).unwrap().pitch_class, 6);
        assert_eq!(Tonic::parse("Db", Mode::Major).unwrap().pitch_class, 1);
        assert_eq!(Tonic::parse("Bb", Mode::Minor).unwrap().to_string(), "A# minor");
        assert!(Tonic::parse("H", Mode::Major).is_err());
        assert!(Tonic::parse("", Mode::Major).is_err());
        assert!(Tonic::parse("C##", Mode::Major).is_err());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("M".parse::<Mode>().unwrap(), Mode::Major);
        assert_eq!("minor".parse::<Mode>().unwrap(), Mode::Minor);
        assert!("dorian".parse::<Mode>().is_err());
    }
}
