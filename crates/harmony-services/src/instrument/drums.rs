//! One-shot drum kit synthesizer

use harmony_core::DrumHit;

/// State for a single drum voice
#[derive(Debug, Clone)]
struct DrumVoice {
    hit: DrumHit,
    active: bool,
    age: usize,

    phase: f64,
    phase2: f64,

    amp_env: f64,
    pitch_env: f64,
    noise_env: f64,

    // Two-pole filter state for the noise sources
    filter_state: f64,
    filter_state2: f64,
}

impl DrumVoice {
    fn new() -> Self {
        Self {
            hit: DrumHit::Kick,
            active: false,
            age: 0,
            phase: 0.0,
            phase2: 0.0,
            amp_env: 0.0,
            pitch_env: 0.0,
            noise_env: 0.0,
            filter_state: 0.0,
            filter_state2: 0.0,
        }
    }

    fn is_hat(&self) -> bool {
        matches!(self.hit, DrumHit::ClosedHat | DrumHit::OpenHat)
    }

    fn trigger(&mut self, hit: DrumHit) {
        self.hit = hit;
        self.active = true;
        self.age = 0;
        self.phase = 0.0;
        self.phase2 = 0.0;
        self.amp_env = 1.0;
        self.pitch_env = 1.0;
        self.noise_env = 1.0;
        self.filter_state = 0.0;
        self.filter_state2 = 0.0;
    }

    fn tick(&mut self, sample_rate: f32, params: &DrumKitParams) -> f32 {
        if !self.active {
            return 0.0;
        }

        self.age += 1;
        let dt = 1.0 / sample_rate as f64;

        let sample = match self.hit {
            DrumHit::Kick => self.tick_kick(dt, params),
            DrumHit::Snare => self.tick_snare(dt, params),
            DrumHit::ClosedHat => self.tick_hat(dt, params, true),
            DrumHit::OpenHat => self.tick_hat(dt, params, false),
            DrumHit::Ride => self.tick_ride(dt, params),
        };

        // Tonal voices leave noise_env untouched and vice versa
        let noise_done = self.noise_env < 0.0001 || !self.uses_noise_env();
        if self.amp_env < 0.0001 && noise_done {
            self.active = false;
        }

        sample as f32
    }

    fn uses_noise_env(&self) -> bool {
        self.hit == DrumHit::Snare
    }

    fn tick_kick(&mut self, dt: f64, params: &DrumKitParams) -> f64 {
        // 40-80 Hz body with a fast downward sweep
        let base_freq = 40.0 + params.kick_tune as f64 * 40.0;

        let pitch_decay = 0.02 + (1.0 - params.kick_decay as f64) * 0.03;
        self.pitch_env *= (-dt / pitch_decay).exp();

        let freq = base_freq * (1.0 + self.pitch_env * 3.0);
        self.phase += freq * dt;
        let osc = (self.phase * std::f64::consts::TAU).sin();

        let amp_decay = 0.1 + params.kick_decay as f64 * 0.4;
        self.amp_env *= (-dt / amp_decay).exp();

        osc * self.amp_env * params.kick_level as f64
    }

    fn tick_snare(&mut self, dt: f64, params: &DrumKitParams) -> f64 {
        // Two tuned tones for the body plus band-passed noise for the wires
        let tone1_freq = 180.0 + params.snare_tune as f64 * 40.0;
        self.phase += tone1_freq * dt;
        let tone1 = (self.phase * std::f64::consts::TAU).sin();

        let tone2_freq = 330.0 + params.snare_tune as f64 * 50.0;
        self.phase2 += tone2_freq * dt;
        let tone2 = (self.phase2 * std::f64::consts::TAU).sin();

        let tone_decay = 0.015 + params.snare_decay as f64 * 0.025;
        self.pitch_env *= (-dt / tone_decay).exp();
        self.amp_env = self.pitch_env;

        let noise = fastrand::f64() * 2.0 - 1.0;
        let bp_freq = 0.15;
        let bp_q = 0.7;
        self.filter_state += bp_freq * (noise - self.filter_state);
        self.filter_state2 += bp_freq * bp_q * (self.filter_state - self.filter_state2);
        let filtered_noise = self.filter_state - self.filter_state2;

        let noise_decay = 0.06 + params.snare_decay as f64 * 0.09;
        self.noise_env *= (-dt / noise_decay).exp();

        let tone_mix = params.snare_tone as f64;
        let tones = (tone1 * 0.6 + tone2 * 0.4) * self.pitch_env * tone_mix;
        let wires = filtered_noise * self.noise_env * 1.5 * (1.0 - tone_mix * 0.3);

        (tones + wires) * params.snare_level as f64
    }

    fn tick_hat(&mut self, dt: f64, params: &DrumKitParams, closed: bool) -> f64 {
        let noise = fastrand::f64() * 2.0 - 1.0;

        let hp_cutoff = 0.3;
        self.filter_state += hp_cutoff * (noise - self.filter_state);
        let highpassed = noise - self.filter_state;

        // Closed 20-50ms, open 200-500ms
        let decay = if closed {
            0.02 + params.hat_decay as f64 * 0.03
        } else {
            0.2 + params.hat_decay as f64 * 0.3
        };
        self.amp_env *= (-dt / decay).exp();

        highpassed * self.amp_env * params.hat_level as f64
    }

    fn tick_ride(&mut self, dt: f64, params: &DrumKitParams) -> f64 {
        // Metallic noise with a faint bell partial
        let noise = fastrand::f64() * 2.0 - 1.0;

        let hp_cutoff = 0.25;
        self.filter_state += hp_cutoff * (noise - self.filter_state);
        let highpassed = noise - self.filter_state;

        self.phase += 3150.0 * dt;
        let bell = (self.phase * std::f64::consts::TAU).sin() * 0.25;

        // 300ms - 1.2s
        let decay = 0.3 + params.ride_decay as f64 * 0.9;
        self.amp_env *= (-dt / decay).exp();

        (highpassed * 0.6 + bell) * self.amp_env * params.ride_level as f64
    }
}

/// Parameters for the drum kit, all in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct DrumKitParams {
    pub master: f32,
    pub kick_level: f32,
    pub kick_tune: f32,
    pub kick_decay: f32,
    pub snare_level: f32,
    pub snare_tune: f32,
    pub snare_decay: f32,
    pub snare_tone: f32,
    pub hat_level: f32,
    pub hat_decay: f32,
    pub ride_level: f32,
    pub ride_decay: f32,
}

impl Default for DrumKitParams {
    fn default() -> Self {
        Self {
            master: 0.6,
            kick_level: 0.9,
            kick_tune: 0.5,
            kick_decay: 0.5,
            snare_level: 0.8,
            snare_tune: 0.5,
            snare_decay: 0.5,
            snare_tone: 0.4,
            hat_level: 0.5,
            hat_decay: 0.3,
            ride_level: 0.4,
            ride_decay: 0.5,
        }
    }
}

const MAX_VOICES: usize = 16;

/// Drum kit for the percussion sequencer. Every hit is a one-shot that
/// decays on its own.
pub struct DrumKit {
    sample_rate: f32,
    voices: Vec<DrumVoice>,
    params: DrumKitParams,
}

impl std::fmt::Debug for DrumKit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrumKit")
            .field("sample_rate", &self.sample_rate)
            .field("active_voices", &self.active_voices())
            .finish()
    }
}

impl DrumKit {
    pub fn new(sample_rate: f32, params: DrumKitParams) -> Self {
        Self {
            sample_rate,
            voices: (0..MAX_VOICES).map(|_| DrumVoice::new()).collect(),
            params,
        }
    }

    pub fn trigger(&mut self, hit: DrumHit) {
        // Hi-hat choke: either hat cuts the other
        if matches!(hit, DrumHit::ClosedHat | DrumHit::OpenHat) {
            for voice in &mut self.voices {
                if voice.active && voice.is_hat() {
                    voice.active = false;
                }
            }
        }

        // Same drum (retrigger), else a free voice, else the oldest
        let index = self
            .voices
            .iter()
            .position(|v| v.active && v.hit == hit)
            .or_else(|| self.voices.iter().position(|v| !v.active))
            .unwrap_or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, v)| v.age)
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            });

        self.voices[index].trigger(hit);
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    pub fn next_sample(&mut self) -> f32 {
        let mut mix = 0.0f32;
        for voice in &mut self.voices {
            if voice.active {
                mix += voice.tick(self.sample_rate, &self.params);
            }
        }
        (mix * self.params.master).tanh()
    }
}
