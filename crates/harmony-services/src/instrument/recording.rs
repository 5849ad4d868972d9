//! Instrument that records calls instead of making sound

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use harmony_core::{DrumHit, Pitch};

use super::{Instrument, InstrumentError};

/// One call made on the instrument
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentCall {
    Attack { pitches: Vec<Pitch>, duration: Duration },
    ReleaseAll,
    Hit(DrumHit),
}

#[derive(Debug, Default)]
struct Log {
    calls: Vec<InstrumentCall>,
    sounding: usize,
    failing: bool,
}

/// Records every call in a log shared by all clones, so a test can keep a
/// handle while the scheduler owns the instrument.
#[derive(Debug, Clone, Default)]
pub struct RecordingInstrument {
    log: Arc<Mutex<Log>>,
}

impl RecordingInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    /// An instrument whose attacks and hits fail as unavailable
    pub fn failing() -> Self {
        let instrument = Self::new();
        instrument.set_failing(true);
        instrument
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_failing(&self, failing: bool) {
        self.log().failing = failing;
    }

    pub fn calls(&self) -> Vec<InstrumentCall> {
        self.log().calls.clone()
    }

    /// Pitches of every attack, in order
    pub fn attacks(&self) -> Vec<Vec<Pitch>> {
        self.log()
            .calls
            .iter()
            .filter_map(|call| match call {
                InstrumentCall::Attack { pitches, .. } => Some(pitches.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn hits(&self) -> Vec<DrumHit> {
        self.log()
            .calls
            .iter()
            .filter_map(|call| match call {
                InstrumentCall::Hit(hit) => Some(*hit),
                _ => None,
            })
            .collect()
    }

    pub fn release_count(&self) -> usize {
        self.log()
            .calls
            .iter()
            .filter(|call| matches!(call, InstrumentCall::ReleaseAll))
            .count()
    }

    /// Chord voices attacked and not yet released
    pub fn sounding_voices(&self) -> usize {
        self.log().sounding
    }

    pub fn clear(&self) {
        let mut log = self.log();
        log.calls.clear();
        log.sounding = 0;
    }
}

impl Instrument for RecordingInstrument {
    fn name(&self) -> &str {
        "Recorder"
    }

    fn attack(&mut self, pitches: &[Pitch], duration: Duration) -> Result<(), InstrumentError> {
        let mut log = self.log();
        if log.failing {
            return Err(InstrumentError::Unavailable("recorder set to fail".into()));
        }
        log.calls.push(InstrumentCall::Attack {
            pitches: pitches.to_vec(),
            duration,
        });
        // The previous chord's slot has always ended by the next attack
        log.sounding = pitches.len();
        Ok(())
    }

    fn release_all(&mut self) {
        let mut log = self.log();
        log.calls.push(InstrumentCall::ReleaseAll);
        log.sounding = 0;
    }

    fn hit(&mut self, hit: DrumHit) -> Result<(), InstrumentError> {
        let mut log = self.log();
        if log.failing {
            return Err(InstrumentError::Unavailable("recorder set to fail".into()));
        }
        log.calls.push(InstrumentCall::Hit(hit));
        Ok(())
    }
}
