//! harmony-services: Playback scheduler, instruments, audio output and service clients

pub mod audio_io;
pub mod generation;
pub mod instrument;
pub mod player;
pub mod render;
pub mod scheduler;
pub mod sequencer;
pub mod session;
pub mod timer;

pub use audio_io::{AudioOutputError, LiveOutput, OutputDevice};
pub use generation::{GenerationClient, GenerationError, GenerationParams};
pub use instrument::{
    ChordSynth, DrumKit, DrumKitParams, Instrument, InstrumentCall, InstrumentError,
    RackHandle, RecordingInstrument, SynthParams, SynthRack,
};
pub use player::{Player, PlayerError};
pub use render::{render_to_wav, RenderError, RenderOptions, RenderSummary};
pub use scheduler::{Continuation, PlaybackError, PlaybackEvent, PlayerConfig, Scheduler};
pub use sequencer::{PercussionSequencer, SequencerState};
pub use session::{SessionGate, SessionId};
pub use timer::{TimerId, TimerQueue};
