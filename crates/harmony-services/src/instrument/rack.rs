//! Shared instrument rack: chord synth and drum kit mixed to one output

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use harmony_core::{DrumHit, Pitch};
use tracing::error;

use super::drums::{DrumKit, DrumKitParams};
use super::synth::{ChordSynth, SynthParams};
use super::{Instrument, InstrumentError};

/// Every sound source the engine drives, rendered together
#[derive(Debug)]
pub struct SynthRack {
    chords: ChordSynth,
    drums: DrumKit,
}

impl SynthRack {
    pub fn new(sample_rate: f32, synth: SynthParams, drums: DrumKitParams) -> Self {
        Self {
            chords: ChordSynth::new(sample_rate, synth),
            drums: DrumKit::new(sample_rate, drums),
        }
    }

    pub fn chords(&self) -> &ChordSynth {
        &self.chords
    }

    pub fn render(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let mixed = self.chords.next_sample() + self.drums.next_sample();
            *sample = mixed.clamp(-1.0, 1.0);
        }
    }

    /// Render into an interleaved buffer, same signal on every channel
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            let mixed = (self.chords.next_sample() + self.drums.next_sample()).clamp(-1.0, 1.0);
            frame.fill(mixed);
        }
    }
}

/// Cloneable handle to a rack shared between the clock thread and the audio
/// callback
#[derive(Debug, Clone)]
pub struct RackHandle(Arc<Mutex<SynthRack>>);

impl RackHandle {
    pub fn new(rack: SynthRack) -> Self {
        Self(Arc::new(Mutex::new(rack)))
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, SynthRack>, InstrumentError> {
        self.0.lock().map_err(|_| {
            error!("Instrument rack lock poisoned");
            InstrumentError::Unavailable("instrument rack lock poisoned".into())
        })
    }

    /// Fill an interleaved device buffer. A poisoned rack plays silence.
    pub fn fill_output(&self, data: &mut [f32], channels: usize) {
        match self.0.lock() {
            Ok(mut rack) => rack.render_interleaved(data, channels),
            Err(_) => data.fill(0.0),
        }
    }
}

impl Instrument for RackHandle {
    fn name(&self) -> &str {
        "synth rack"
    }

    fn attack(&mut self, pitches: &[Pitch], duration: Duration) -> Result<(), InstrumentError> {
        let mut rack = self.lock()?;
        for &pitch in pitches {
            rack.chords.note_on(pitch, duration);
        }
        Ok(())
    }

    fn release_all(&mut self) {
        // Nothing is audible through a poisoned rack
        if let Ok(mut rack) = self.lock() {
            rack.chords.release_all();
        }
    }

    fn hit(&mut self, hit: DrumHit) -> Result<(), InstrumentError> {
        self.lock()?.drums.trigger(hit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rack() -> RackHandle {
        RackHandle::new(SynthRack::new(8000.0, SynthParams::default(), DrumKitParams::default()))
    }

    #[test]
    fn test_attack_and_release_through_handle() {
        let mut handle = rack();
        handle
            .attack(&[Pitch(60), Pitch(64), Pitch(67)], Duration::from_secs(2))
            .unwrap();
        assert_eq!(handle.lock().unwrap().chords().sounding_voices(), 3);

        handle.release_all();
        assert_eq!(handle.lock().unwrap().chords().sounding_voices(), 0);
    }

    #[test]
    fn test_hit_and_render_interleaved() {
        let mut handle = rack();
        handle.hit(DrumHit::Kick).unwrap();

        let mut data = vec![0.0f32; 512];
        handle.fill_output(&mut data, 2);
        assert!(data.iter().any(|s| s.abs() > 0.0));
        assert!(data.chunks(2).all(|frame| frame[0] == frame[1]));
    }

    #[test]
    fn test_poisoned_rack_is_unavailable() {
        let handle = rack();
        let poisoner = handle.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.0.lock().unwrap();
            panic!("poison");
        })
        .join();

        let mut handle = handle;
        assert!(matches!(
            handle.hit(DrumHit::Snare),
            Err(InstrumentError::Unavailable(_))
        ));
        handle.release_all();

        let mut data = vec![1.0f32; 64];
        handle.fill_output(&mut data, 2);
        assert!(data.iter().all(|&s| s == 0.0));
    }
}
