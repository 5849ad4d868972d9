//! harmony-core: Domain types for the chord progression player

mod error;
pub mod percussion;
pub mod pitch;
pub mod progression;
mod transport;
pub mod voice_leading;

pub use error::{HarmonyError, Result};
pub use percussion::{DrumConfig, DrumHit, DrumPattern};
pub use pitch::{
    pitch_to_note_name, resolve_symbol_to_pitches, ChordQuality, Mode, NoteName, Pitch, Tonic,
};
pub use progression::{Chord, ChordSpec, PlaybackRequest, ProgressionPayload, MAX_CHORD_BEATS};
pub use transport::{Articulation, PlaybackState, Tempo, TransportClock, MAX_BPM, MIN_BPM};
pub use voice_leading::{optimize, total_displacement, Voicer};
