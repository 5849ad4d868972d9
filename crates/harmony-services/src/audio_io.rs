//! Audio output for live playback

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig, SupportedStreamConfig};
use thiserror::Error;
use tracing::{error, info};

use crate::instrument::{DrumKitParams, InstrumentError, RackHandle, SynthParams, SynthRack};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No audio output devices found")]
    NoDevices,
    #[error("Failed to get default output config: {0}")]
    ConfigError(String),
    #[error("Output device wants {0:?} samples, only f32 is supported")]
    UnsupportedFormat(SampleFormat),
    #[error("Failed to build output stream: {0}")]
    StreamError(String),
}

impl From<AudioOutputError> for InstrumentError {
    fn from(err: AudioOutputError) -> Self {
        InstrumentError::Unavailable(err.to_string())
    }
}

/// The host's default output device and the config the rack renders at
pub struct OutputDevice {
    device: cpal::Device,
    config: SupportedStreamConfig,
}

impl OutputDevice {
    pub fn default_output() -> Result<Self, AudioOutputError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(AudioOutputError::NoDevices)?;
        let config = device
            .default_output_config()
            .map_err(|e| AudioOutputError::ConfigError(e.to_string()))?;
        if config.sample_format() != SampleFormat::F32 {
            return Err(AudioOutputError::UnsupportedFormat(config.sample_format()));
        }
        Ok(Self { device, config })
    }

    pub fn name(&self) -> String {
        self.device.name().unwrap_or_default()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Start a stream that renders `rack` until `muted` is set
    fn play(&self, rack: RackHandle, muted: Arc<AtomicBool>) -> Result<cpal::Stream, AudioOutputError> {
        let channels = self.channels() as usize;
        let config: StreamConfig = self.config.clone().into();

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if muted.load(Ordering::Relaxed) {
                        data.fill(0.0);
                    } else {
                        rack.fill_output(data, channels);
                    }
                },
                move |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;
        stream
            .play()
            .map_err(|e| AudioOutputError::StreamError(e.to_string()))?;
        Ok(stream)
    }
}

/// A synth rack playing through the default output device.
///
/// The stream is tied to the thread that opened it. Hand [`LiveOutput::rack`]
/// to the player and keep this value alive for as long as sound should play.
pub struct LiveOutput {
    rack: RackHandle,
    muted: Arc<AtomicBool>,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl LiveOutput {
    pub fn open(synth: SynthParams, drums: DrumKitParams) -> Result<Self, InstrumentError> {
        let device = OutputDevice::default_output()?;
        let sample_rate = device.sample_rate();
        let rack = RackHandle::new(SynthRack::new(sample_rate as f32, synth, drums));
        let muted = Arc::new(AtomicBool::new(false));

        let stream = device.play(rack.clone(), muted.clone())?;
        info!(
            device = %device.name(),
            sample_rate,
            channels = device.channels(),
            "Rack output started"
        );

        Ok(Self {
            rack,
            muted,
            sample_rate,
            _stream: stream,
        })
    }

    /// Instrument handle for the player
    pub fn rack(&self) -> RackHandle {
        self.rack.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Silence the device. The rack keeps running for whoever holds it.
    pub fn stop(&self) {
        self.muted.store(true, Ordering::Relaxed);
    }
}

impl Drop for LiveOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
