//! Offline rendering of a progression to a WAV file
//!
//! Runs the same scheduler as live playback, with the clock advanced by the
//! number of samples written instead of by wall time.

use std::path::Path;
use std::time::Duration;

use harmony_core::PlaybackRequest;
use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;
use tracing::{debug, info};

use crate::instrument::{DrumKitParams, InstrumentError, RackHandle, SynthParams, SynthRack};
use crate::scheduler::{PlaybackError, PlaybackEvent, PlayerConfig, Scheduler};

const BLOCK_SIZE: usize = 512;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("WAV write failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("Playback failed: {0}")]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    #[error("Sample rate must be positive")]
    InvalidSampleRate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSummary {
    pub chords: usize,
    pub drum_steps: u64,
    pub samples: u64,
    pub sample_rate: u32,
}

impl RenderSummary {
    pub fn duration(&self) -> Duration {
        samples_to_duration(self.samples, self.sample_rate)
    }
}

/// Sound sources and format for a render
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub player: PlayerConfig,
    pub synth: SynthParams,
    pub drums: DrumKitParams,
    pub sample_rate: u32,
    /// Silence kept after the session ends so releases can ring out
    pub tail: Duration,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            synth: SynthParams::default(),
            drums: DrumKitParams::default(),
            sample_rate: 44100,
            tail: Duration::from_secs(1),
        }
    }
}

fn samples_to_duration(samples: u64, sample_rate: u32) -> Duration {
    Duration::try_from_secs_f64(samples as f64 / sample_rate as f64).unwrap_or(Duration::MAX)
}

fn duration_to_samples(duration: Duration, sample_rate: u32) -> u64 {
    (duration.as_secs_f64() * sample_rate as f64).ceil() as u64
}

/// Render `request` to a mono 32-bit float WAV at `path`
pub fn render_to_wav(
    request: PlaybackRequest,
    options: &RenderOptions,
    path: &Path,
) -> Result<RenderSummary, RenderError> {
    let sample_rate = options.sample_rate;
    if sample_rate == 0 {
        return Err(RenderError::InvalidSampleRate);
    }
    let rack = RackHandle::new(SynthRack::new(
        sample_rate as f32,
        options.synth.clone(),
        options.drums.clone(),
    ));
    let mut scheduler = Scheduler::new(rack.clone(), options.player);

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let tail = duration_to_samples(options.tail, sample_rate);

    info!(path = %path.display(), sample_rate, chords = request.len(), "Rendering");
    scheduler.start(request, Duration::ZERO);

    let mut buffer = vec![0.0f32; BLOCK_SIZE];
    let mut position = 0u64;
    let mut end: Option<u64> = None;
    let mut chords = 0;

    loop {
        scheduler.advance(samples_to_duration(position, sample_rate));
        for event in scheduler.take_events() {
            match event {
                PlaybackEvent::ChordAttacked { .. } => chords += 1,
                PlaybackEvent::Completed { .. } | PlaybackEvent::Aborted { .. } => {
                    end = Some(position.saturating_add(tail));
                }
                PlaybackEvent::Failed { error, .. } => return Err(error.into()),
                PlaybackEvent::Started { .. } => {}
            }
        }

        let mut frames = BLOCK_SIZE as u64;
        if let Some(deadline) = scheduler.next_deadline() {
            let due = duration_to_samples(deadline, sample_rate);
            frames = frames.min(due.saturating_sub(position).max(1));
        }
        if let Some(end) = end {
            if position >= end {
                break;
            }
            frames = frames.min(end - position);
        }

        let block = &mut buffer[..frames as usize];
        rack.lock()?.render(block);
        for &sample in block.iter() {
            writer.write_sample(sample)?;
        }
        position += frames;
    }

    writer.finalize()?;

    let summary = RenderSummary {
        chords,
        drum_steps: scheduler.percussion().steps_played(),
        samples: position,
        sample_rate,
    };
    debug!(?summary, "Render finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use harmony_core::{ChordSpec, DrumConfig, DrumPattern, HarmonyError, Tempo, Tonic};

    use super::*;

    fn request(symbols: &[&str], drums: DrumConfig) -> PlaybackRequest {
        PlaybackRequest::new(
            symbols.iter().map(|s| ChordSpec::symbolic(*s, 1.0)).collect(),
            Tempo::new(240.0).unwrap(),
            Tonic::default(),
            drums,
        )
    }

    fn options() -> RenderOptions {
        RenderOptions {
            sample_rate: 8000,
            tail: Duration::from_millis(250),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_writes_progression_and_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let summary = render_to_wav(
            request(&["I", "V"], DrumConfig::enabled(DrumPattern::Basic)),
            &options(),
            &path,
        )
        .unwrap();
        assert_eq!(summary.chords, 2);
        assert_eq!(summary.drum_steps, 2);
        assert!(summary.samples.abs_diff(6000) <= 1, "{summary:?}");

        let mut reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.len() as u64, summary.samples);
        let peak = reader
            .samples::<f32>()
            .map(|s| s.unwrap().abs())
            .fold(0.0f32, f32::max);
        assert!(peak > 0.0 && peak <= 1.0);
    }

    #[test]
    fn test_render_surfaces_invalid_symbol() {
        let dir = tempfile::tempdir().unwrap();
        let result = render_to_wav(
            request(&["I", "H"], DrumConfig::disabled()),
            &options(),
            &dir.path().join("bad.wav"),
        );
        assert!(matches!(
            result,
            Err(RenderError::Playback(PlaybackError::InvalidSymbol(HarmonyError::InvalidSymbol(_))))
        ));
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silent.wav");
        let options = RenderOptions {
            sample_rate: 0,
            ..options()
        };
        let result = render_to_wav(request(&["I"], DrumConfig::disabled()), &options, &path);
        assert!(matches!(result, Err(RenderError::InvalidSampleRate)));
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_progression_is_just_the_tail() {
        let dir = tempfile::tempdir().unwrap();
        let summary = render_to_wav(request(&[], DrumConfig::disabled()), &options(), &dir.path().join("empty.wav"))
            .unwrap();
        assert_eq!(summary.chords, 0);
        assert_eq!(summary.samples, 2000);
    }
}
