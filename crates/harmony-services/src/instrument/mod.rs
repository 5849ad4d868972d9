//! Instrument layer: the sound-producing capability driven by the scheduler

pub mod drums;
pub mod rack;
mod recording;
pub mod synth;

pub use drums::{DrumKit, DrumKitParams};
pub use rack::{RackHandle, SynthRack};
pub use recording::{InstrumentCall, RecordingInstrument};
pub use synth::{ChordSynth, SynthParams};

use std::time::Duration;

use harmony_core::{DrumHit, Pitch};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstrumentError {
    #[error("Instrument unavailable: {0}")]
    Unavailable(String),
}

/// Opaque sound source. Voices are shared, so only the scheduler and the
/// percussion sequencer call into it.
pub trait Instrument: Send {
    /// Instrument display name
    fn name(&self) -> &str;
    /// Start sounding `pitches`; each note releases itself after `duration`
    fn attack(&mut self, pitches: &[Pitch], duration: Duration) -> Result<(), InstrumentError>;
    /// Release every sounding chord voice immediately
    fn release_all(&mut self);
    /// Trigger a self-terminating percussion sound
    fn hit(&mut self, hit: DrumHit) -> Result<(), InstrumentError>;
}

impl<I: Instrument + ?Sized> Instrument for Box<I> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn attack(&mut self, pitches: &[Pitch], duration: Duration) -> Result<(), InstrumentError> {
        (**self).attack(pitches, duration)
    }

    fn release_all(&mut self) {
        (**self).release_all()
    }

    fn hit(&mut self, hit: DrumHit) -> Result<(), InstrumentError> {
        (**self).hit(hit)
    }
}
