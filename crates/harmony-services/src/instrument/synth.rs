//! Polyphonic chord synth: a sine and a detuned square per note, shaped by an
//! ADSR envelope and summed through a low-pass filter

use std::fmt;
use std::time::Duration;

use fundsp::hacker::*;
use harmony_core::Pitch;

const MAX_VOICES: usize = 16;
const SILENCE: f64 = 0.0001;

/// Parameters for the chord synth
#[derive(Debug, Clone, PartialEq)]
pub struct SynthParams {
    /// Envelope times in seconds, sustain as a level in `[0, 1]`
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
    pub sine_db: f32,
    pub square_db: f32,
    pub square_detune_cents: f64,
    pub cutoff_hz: f32,
    pub master_db: f32,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            attack: 0.1,
            decay: 0.3,
            sustain: 0.2,
            release: 0.6,
            sine_db: -12.0,
            square_db: -16.0,
            square_detune_cents: -5.0,
            cutoff_hz: 200.0,
            master_db: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
struct SynthVoice {
    pitch: Pitch,
    stage: Stage,
    level: f64,
    release_from: f64,
    freq: f64,
    sine_phase: f64,
    square_phase: f64,
    /// Seconds left before the note releases itself
    remaining: f64,
    age: u64,
}

impl SynthVoice {
    fn new() -> Self {
        Self {
            pitch: Pitch(0),
            stage: Stage::Idle,
            level: 0.0,
            release_from: 0.0,
            freq: 0.0,
            sine_phase: 0.0,
            square_phase: 0.0,
            remaining: 0.0,
            age: 0,
        }
    }

    fn is_active(&self) -> bool {
        self.stage != Stage::Idle
    }

    fn is_sounding(&self) -> bool {
        self.is_active() && self.stage != Stage::Release
    }

    fn trigger(&mut self, pitch: Pitch, duration: Duration) {
        self.pitch = pitch;
        self.stage = Stage::Attack;
        self.level = 0.0;
        self.freq = pitch.note_name().frequency();
        self.sine_phase = 0.0;
        self.square_phase = 0.0;
        self.remaining = duration.as_secs_f64();
        self.age = 0;
    }

    fn release(&mut self) {
        if self.is_sounding() {
            self.stage = Stage::Release;
            self.release_from = self.level;
        }
    }

    fn tick(&mut self, dt: f64, params: &SynthParams, detune: f64, gains: (f64, f64)) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        self.age += 1;

        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.release();
        }

        match self.stage {
            Stage::Attack => {
                self.level += dt / params.attack.max(SILENCE);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = Stage::Decay;
                }
            }
            Stage::Decay => {
                self.level -= dt * (1.0 - params.sustain) / params.decay.max(SILENCE);
                if self.level <= params.sustain {
                    self.level = params.sustain;
                    self.stage = Stage::Sustain;
                }
            }
            Stage::Sustain => {}
            Stage::Release => {
                self.level -= dt * self.release_from.max(SILENCE) / params.release.max(SILENCE);
                if self.level <= SILENCE {
                    self.level = 0.0;
                    self.stage = Stage::Idle;
                    return 0.0;
                }
            }
            Stage::Idle => return 0.0,
        }

        self.sine_phase = (self.sine_phase + self.freq * dt).fract();
        self.square_phase = (self.square_phase + self.freq * detune * dt).fract();

        let sine = (self.sine_phase * std::f64::consts::TAU).sin();
        let square = if self.square_phase < 0.5 { 1.0 } else { -1.0 };

        (sine * gains.0 + square * gains.1) * self.level
    }
}

/// Polyphonic chord synth. Notes are started with a sounding length and
/// release themselves when it runs out.
pub struct ChordSynth {
    sample_rate: f32,
    voices: Vec<SynthVoice>,
    params: SynthParams,
    sine_gain: f64,
    square_gain: f64,
    master_gain: f32,
    detune: f64,
    filter: An<FixedSvf<f64, LowpassMode<f64>>>,
}

impl fmt::Debug for ChordSynth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChordSynth")
            .field("sample_rate", &self.sample_rate)
            .field("active_voices", &self.active_voices())
            .field("params", &self.params)
            .finish()
    }
}

impl ChordSynth {
    pub fn new(sample_rate: f32, params: SynthParams) -> Self {
        let mut filter = lowpass_hz(params.cutoff_hz, 0.707);
        filter.set_sample_rate(sample_rate as f64);

        Self {
            sample_rate,
            voices: (0..MAX_VOICES).map(|_| SynthVoice::new()).collect(),
            sine_gain: db_amp(params.sine_db) as f64,
            square_gain: db_amp(params.square_db) as f64,
            master_gain: db_amp(params.master_db) as f32,
            detune: 2f64.powf(params.square_detune_cents / 1200.0),
            params,
            filter,
        }
    }

    /// Start one note. Takes a free voice, or steals the oldest.
    pub fn note_on(&mut self, pitch: Pitch, duration: Duration) {
        let index = self
            .voices
            .iter()
            .position(|v| !v.is_active())
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, v)| v.age)
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);

        self.voices[index].trigger(pitch, duration);
    }

    /// Move every held note into its release stage
    pub fn release_all(&mut self) {
        for voice in &mut self.voices {
            voice.release();
        }
    }

    /// Voices producing sound, including those releasing
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Voices not yet released
    pub fn sounding_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_sounding()).count()
    }

    pub fn next_sample(&mut self) -> f32 {
        let dt = 1.0 / self.sample_rate as f64;
        let gains = (self.sine_gain, self.square_gain);

        let mut mix = 0.0;
        for voice in &mut self.voices {
            if voice.is_active() {
                mix += voice.tick(dt, &self.params, self.detune, gains);
            }
        }

        let output = self.filter.tick(&Frame::from([mix as f32]));
        output[0] * self.master_gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 8000.0;

    fn run(synth: &mut ChordSynth, seconds: f64) -> Vec<f32> {
        (0..(seconds * RATE as f64) as usize)
            .map(|_| synth.next_sample())
            .collect()
    }

    fn peak(samples: &[f32]) -> f32 {
        samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_silent_when_idle() {
        let mut synth = ChordSynth::new(RATE, SynthParams::default());
        assert_eq!(peak(&run(&mut synth, 0.1)), 0.0);
    }

    #[test]
    fn test_note_releases_itself() {
        let mut synth = ChordSynth::new(RATE, SynthParams::default());
        for value in [60, 64, 67] {
            synth.note_on(Pitch(value), Duration::from_millis(500));
        }
        assert_eq!(synth.sounding_voices(), 3);

        let held = run(&mut synth, 0.4);
        assert!(peak(&held) > 0.0);
        assert_eq!(synth.sounding_voices(), 3);

        // Past the sounding length plus the release time
        run(&mut synth, 0.8);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn test_release_all() {
        let mut synth = ChordSynth::new(RATE, SynthParams::default());
        synth.note_on(Pitch(72), Duration::from_secs(10));
        run(&mut synth, 0.2);

        synth.release_all();
        assert_eq!(synth.sounding_voices(), 0);
        assert_eq!(synth.active_voices(), 1);

        run(&mut synth, 1.0);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn test_voice_stealing() {
        let mut synth = ChordSynth::new(RATE, SynthParams::default());
        for value in 0..(MAX_VOICES as i32 + 4) {
            synth.note_on(Pitch(48 + value), Duration::from_secs(1));
            synth.next_sample();
        }
        assert_eq!(synth.active_voices(), MAX_VOICES);
    }
}
