//! Playback scheduler: walks a progression on a virtual clock
//!
//! The scheduler never sleeps. Each chord attack schedules a continuation for
//! the next one, and whoever owns the scheduler calls [`Scheduler::advance`]
//! when the earliest continuation is due. Every continuation carries its
//! session token and re-checks it against the [`SessionGate`] before acting.

use std::sync::Arc;
use std::time::Duration;

use harmony_core::{
    Articulation, ChordSpec, HarmonyError, PlaybackRequest, PlaybackState, Pitch, Tonic,
    TransportClock, Voicer,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::instrument::{Instrument, InstrumentError};
use crate::sequencer::PercussionSequencer;
use crate::session::{SessionGate, SessionId};
use crate::timer::{TimerId, TimerQueue};

/// Work scheduled on the timer queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Attack chord `index`, or finish the walk if it is past the end
    ChordStep { session: SessionId, index: usize },
    DrumStep { session: SessionId, step: u64 },
}

impl Continuation {
    pub fn session(&self) -> SessionId {
        match self {
            Self::ChordStep { session, .. } | Self::DrumStep { session, .. } => *session,
        }
    }
}

/// Failures that end a session. Only the session is lost, never the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("Chord resolution failed: {0}")]
    InvalidSymbol(#[from] HarmonyError),
    #[error(transparent)]
    InstrumentUnavailable(#[from] InstrumentError),
}

/// What a session reports to the control surface
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started {
        session: SessionId,
        chords: usize,
    },
    ChordAttacked {
        session: SessionId,
        index: usize,
        symbol: String,
        pitches: Vec<Pitch>,
        /// Clock time of the attack
        at: Duration,
        sounding: Duration,
    },
    Completed {
        session: SessionId,
    },
    Aborted {
        session: SessionId,
    },
    Failed {
        session: SessionId,
        error: PlaybackError,
    },
}

impl PlaybackEvent {
    pub fn session(&self) -> SessionId {
        match self {
            Self::Started { session, .. }
            | Self::ChordAttacked { session, .. }
            | Self::Completed { session }
            | Self::Aborted { session }
            | Self::Failed { session, .. } => *session,
        }
    }

    /// Whether this is the last event of its session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Aborted { .. } | Self::Failed { .. }
        )
    }
}

/// Engine-level playback settings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerConfig {
    pub articulation: Articulation,
}

/// Why a chord step did not go ahead
enum Interrupt {
    /// The token was superseded or revoked. Torn down silently.
    StaleSession,
    Failed(PlaybackError),
}

enum Step {
    Continue,
    Finished,
}

enum Outcome {
    Completed,
    Aborted,
    Failed(PlaybackError),
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    progression: Arc<[ChordSpec]>,
    tonic: Tonic,
    clock: TransportClock,
    next_index: usize,
    beat_cursor: f64,
    voicer: Voicer,
    pending: Option<TimerId>,
}

pub struct Scheduler<I> {
    instrument: I,
    gate: Arc<SessionGate>,
    config: PlayerConfig,
    timers: TimerQueue<Continuation>,
    drums: PercussionSequencer,
    session: Option<ActiveSession>,
    state: PlaybackState,
    events: Vec<PlaybackEvent>,
}

impl<I: Instrument> Scheduler<I> {
    pub fn new(instrument: I, config: PlayerConfig) -> Self {
        Self::with_gate(instrument, config, Arc::new(SessionGate::new()))
    }

    /// Build a scheduler that shares its session gate with a control surface
    pub fn with_gate(instrument: I, config: PlayerConfig, gate: Arc<SessionGate>) -> Self {
        Self {
            instrument,
            gate,
            config,
            timers: TimerQueue::new(),
            drums: PercussionSequencer::new(),
            session: None,
            state: PlaybackState::Idle,
            events: Vec::new(),
        }
    }

    pub fn gate(&self) -> &Arc<SessionGate> {
        &self.gate
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether a session is live and still holds the current token
    pub fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|active| self.gate.is_current(active.id))
    }

    pub fn current_session(&self) -> Option<SessionId> {
        self.session.as_ref().map(|active| active.id)
    }

    pub fn percussion(&self) -> &PercussionSequencer {
        &self.drums
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Drain the events produced since the last call
    pub fn take_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Issue a new token and begin a session at clock time `now`
    pub fn start(&mut self, request: PlaybackRequest, now: Duration) -> SessionId {
        let id = self.gate.issue();
        self.begin(id, request, now);
        id
    }

    /// Begin a session for a token that was already issued on the gate.
    ///
    /// Any live session is torn down first. If `id` has been superseded or
    /// revoked in the meantime, the session is reported aborted and nothing
    /// sounds.
    pub fn begin(&mut self, id: SessionId, request: PlaybackRequest, now: Duration) {
        if let Some(previous) = self.current_session() {
            info!(session = %previous, next = %id, "Superseding session");
            self.teardown(Outcome::Aborted);
        }

        if !self.gate.is_current(id) {
            debug!(session = %id, "Session superseded before it began");
            self.events.push(PlaybackEvent::Aborted { session: id });
            return;
        }

        info!(
            session = %id,
            chords = request.len(),
            tempo = request.tempo.bpm(),
            tonic = %request.tonic,
            drums = request.drums.enabled,
            "Session started"
        );

        let clock = TransportClock::new(now, request.tempo);
        self.state = PlaybackState::Playing;
        self.events.push(PlaybackEvent::Started {
            session: id,
            chords: request.len(),
        });

        // The walk goes first so an empty progression ends before any drum step
        let pending = self
            .timers
            .schedule(now, Continuation::ChordStep { session: id, index: 0 });
        self.session = Some(ActiveSession {
            id,
            progression: request.progression,
            tonic: request.tonic,
            clock,
            next_index: 0,
            beat_cursor: 0.0,
            voicer: Voicer::new(),
            pending: Some(pending),
        });

        if request.drums.enabled {
            self.drums
                .start(id, clock, request.drums.pattern, &mut self.timers);
        }

        self.advance(now);
    }

    /// Revoke the current token and tear the session down. No-op when idle.
    pub fn stop(&mut self) {
        self.gate.revoke_all();
        self.retire_stale();
    }

    /// Tear down the live session if its token is no longer current
    pub fn retire_stale(&mut self) {
        let stale = self
            .session
            .as_ref()
            .is_some_and(|active| !self.gate.is_current(active.id));
        if stale {
            self.teardown(Outcome::Aborted);
        }
    }

    /// Run every continuation due at or before `now`
    pub fn advance(&mut self, now: Duration) {
        while let Some((timer, continuation)) = self.timers.pop_due(now) {
            match continuation {
                Continuation::ChordStep { session, index } => {
                    self.on_chord_step(session, index, timer.due())
                }
                Continuation::DrumStep { session, step } => self.on_drum_step(session, step),
            }
        }
    }

    fn on_chord_step(&mut self, session: SessionId, index: usize, due: Duration) {
        let current = self
            .session
            .as_mut()
            .filter(|active| active.id == session && active.next_index == index);
        let Some(active) = current else {
            debug!(session = %session, index, "Ignoring stale chord continuation");
            return;
        };
        active.pending = None;

        match self.play_chord(due) {
            Ok(Step::Continue) => {}
            Ok(Step::Finished) => self.teardown(Outcome::Completed),
            Err(Interrupt::StaleSession) => {
                debug!(session = %session, index, "Walk reached checkpoint with stale token");
                self.teardown(Outcome::Aborted);
            }
            Err(Interrupt::Failed(error)) => self.teardown(Outcome::Failed(error)),
        }
    }

    fn play_chord(&mut self, due: Duration) -> Result<Step, Interrupt> {
        let Some(active) = self.session.as_mut() else {
            return Err(Interrupt::StaleSession);
        };
        if !self.gate.is_current(active.id) {
            return Err(Interrupt::StaleSession);
        }

        let index = active.next_index;
        let Some(spec) = active.progression.get(index) else {
            return Ok(Step::Finished);
        };
        let chord = spec
            .resolve(&active.tonic)
            .map_err(|e| Interrupt::Failed(e.into()))?;

        let voiced = active.voicer.voice(&chord.pitches);
        let slot = active.clock.tempo().beats_to_duration(chord.duration);
        let sounding = self.config.articulation.apply(slot);

        let instrument = &mut self.instrument;
        match self
            .gate
            .with_rights(active.id, || instrument.attack(&voiced, sounding))
        {
            None => return Err(Interrupt::StaleSession),
            Some(Err(e)) => return Err(Interrupt::Failed(e.into())),
            Some(Ok(())) => {}
        }

        debug!(
            session = %active.id,
            index,
            symbol = %chord.symbol,
            pitches = ?voiced,
            sounding_ms = sounding.as_millis() as u64,
            "Chord attacked"
        );
        self.events.push(PlaybackEvent::ChordAttacked {
            session: active.id,
            index,
            symbol: chord.symbol,
            pitches: voiced,
            at: due,
            sounding,
        });

        // Next slot is measured from the clock origin, not from now
        active.beat_cursor += chord.duration;
        active.next_index += 1;
        let next_due = active.clock.at_beat(active.beat_cursor);
        active.pending = Some(self.timers.schedule(
            next_due,
            Continuation::ChordStep {
                session: active.id,
                index: active.next_index,
            },
        ));
        Ok(Step::Continue)
    }

    fn on_drum_step(&mut self, session: SessionId, step: u64) {
        if self.current_session() != Some(session) {
            debug!(session = %session, step, "Ignoring stale percussion continuation");
            return;
        }

        let result = self.drums.on_step(
            session,
            step,
            &self.gate,
            &mut self.instrument,
            &mut self.timers,
        );
        if let Err(e) = result {
            self.teardown(Outcome::Failed(e.into()));
        } else if !self.gate.is_current(session) {
            debug!(session = %session, step, "Percussion found stale token");
            self.teardown(Outcome::Aborted);
        }
    }

    fn teardown(&mut self, outcome: Outcome) {
        let Some(mut active) = self.session.take() else {
            return;
        };
        self.state = PlaybackState::Stopping;

        if let Some(pending) = active.pending.take() {
            self.timers.cancel(pending);
        }
        self.drums.stop(&mut self.timers);
        self.instrument.release_all();
        self.gate.revoke(active.id);
        active.voicer.reset();

        let id = active.id;
        let event = match outcome {
            Outcome::Completed => {
                info!(session = %id, chords = active.next_index, "Session completed");
                PlaybackEvent::Completed { session: id }
            }
            Outcome::Aborted => {
                info!(session = %id, played = active.next_index, "Session aborted");
                PlaybackEvent::Aborted { session: id }
            }
            Outcome::Failed(error) => {
                match &error {
                    PlaybackError::InvalidSymbol(e) => {
                        warn!(session = %id, index = active.next_index, error = %e, "Session failed")
                    }
                    PlaybackError::InstrumentUnavailable(e) => {
                        error!(session = %id, error = %e, "Session failed")
                    }
                }
                PlaybackEvent::Failed { session: id, error }
            }
        };
        self.events.push(event);
        self.state = PlaybackState::Idle;
    }
}
