//! Tempo-locked percussion sequencer

use harmony_core::{DrumPattern, TransportClock};
use tracing::{debug, info, trace};

use crate::instrument::{Instrument, InstrumentError};
use crate::scheduler::Continuation;
use crate::session::{SessionGate, SessionId};
use crate::timer::{TimerId, TimerQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerState {
    #[default]
    Idle,
    Running,
}

/// Repeating drum cycle scheduled on the session clock.
///
/// Step `n` is due at beat `n * step_beats` from the clock origin, whatever
/// the chord walk is doing.
#[derive(Debug, Default)]
pub struct PercussionSequencer {
    state: SequencerState,
    session: Option<SessionId>,
    clock: Option<TransportClock>,
    pattern: DrumPattern,
    step: u64,
    pending: Option<TimerId>,
}

impl PercussionSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SequencerState::Running
    }

    /// Steps triggered since the last start
    pub fn steps_played(&self) -> u64 {
        self.step
    }

    /// Begin cycling for `session`, first step at the clock origin
    pub fn start(
        &mut self,
        session: SessionId,
        clock: TransportClock,
        pattern: DrumPattern,
        timers: &mut TimerQueue<Continuation>,
    ) {
        self.stop(timers);

        self.state = SequencerState::Running;
        self.session = Some(session);
        self.clock = Some(clock);
        self.pattern = pattern;
        self.step = 0;
        self.pending = Some(timers.schedule(
            clock.origin(),
            Continuation::DrumStep { session, step: 0 },
        ));

        info!(
            session = %session,
            pattern = pattern.name(),
            tempo = clock.tempo().bpm(),
            "Percussion started"
        );
    }

    /// Fire the hits for `step` and schedule the next one. Steps from another
    /// session or an outdated position are ignored.
    pub fn on_step<I: Instrument + ?Sized>(
        &mut self,
        session: SessionId,
        step: u64,
        gate: &SessionGate,
        instrument: &mut I,
        timers: &mut TimerQueue<Continuation>,
    ) -> Result<(), InstrumentError> {
        if !self.is_running() || self.session != Some(session) || self.step != step {
            trace!(session = %session, step, "Ignoring stale percussion step");
            return Ok(());
        }
        let Some(clock) = self.clock else {
            return Ok(());
        };
        self.pending = None;

        let hits = self.pattern.hits_at(step);
        let fired = gate.with_rights(session, || {
            hits.iter().try_for_each(|&hit| instrument.hit(hit))
        });

        match fired {
            None => {
                debug!(session = %session, step, "Percussion step for superseded session");
                self.halt();
                return Ok(());
            }
            Some(result) => result?,
        }
        trace!(session = %session, step, ?hits, "Percussion step");

        self.step += 1;
        let due = clock.at_beat(self.step as f64 * self.pattern.step_beats());
        self.pending = Some(timers.schedule(
            due,
            Continuation::DrumStep {
                session,
                step: self.step,
            },
        ));
        Ok(())
    }

    /// Halt the cycle. Hits already triggered decay on their own.
    pub fn stop(&mut self, timers: &mut TimerQueue<Continuation>) {
        if let Some(pending) = self.pending.take() {
            timers.cancel(pending);
        }
        if self.is_running() {
            debug!(steps = self.step, "Percussion stopped");
        }
        self.halt();
    }

    fn halt(&mut self) {
        self.state = SequencerState::Idle;
        self.session = None;
        self.clock = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use harmony_core::{DrumHit, Tempo};

    use super::*;
    use crate::instrument::RecordingInstrument;

    fn run_until(
        sequencer: &mut PercussionSequencer,
        gate: &SessionGate,
        instrument: &mut RecordingInstrument,
        timers: &mut TimerQueue<Continuation>,
        now: Duration,
    ) {
        while let Some((_, continuation)) = timers.pop_due(now) {
            if let Continuation::DrumStep { session, step } = continuation {
                sequencer
                    .on_step(session, step, gate, instrument, timers)
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_basic_pattern_on_the_beat() {
        let gate = SessionGate::new();
        let session = gate.issue();
        let mut instrument = RecordingInstrument::new();
        let mut timers = TimerQueue::new();
        let mut sequencer = PercussionSequencer::new();
        let clock = TransportClock::new(Duration::ZERO, Tempo::new(120.0).unwrap());

        sequencer.start(session, clock, DrumPattern::Basic, &mut timers);
        assert!(sequencer.is_running());

        // Steps at 0.0, 0.5, 1.0 and 1.5 seconds
        run_until(&mut sequencer, &gate, &mut instrument, &mut timers, Duration::from_millis(1999));
        assert_eq!(sequencer.steps_played(), 4);
        assert_eq!(
            instrument.hits(),
            vec![
                DrumHit::Kick,
                DrumHit::ClosedHat,
                DrumHit::Kick,
                DrumHit::Snare,
                DrumHit::ClosedHat
            ]
        );
        assert_eq!(timers.next_deadline(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_stop_cancels_pending_step() {
        let gate = SessionGate::new();
        let session = gate.issue();
        let mut instrument = RecordingInstrument::new();
        let mut timers = TimerQueue::new();
        let mut sequencer = PercussionSequencer::new();
        let clock = TransportClock::new(Duration::ZERO, Tempo::new(120.0).unwrap());

        sequencer.start(session, clock, DrumPattern::Rock, &mut timers);
        run_until(&mut sequencer, &gate, &mut instrument, &mut timers, Duration::from_millis(300));
        sequencer.stop(&mut timers);

        assert_eq!(sequencer.state(), SequencerState::Idle);
        assert!(timers.is_empty());
        let hits = instrument.hits().len();
        run_until(&mut sequencer, &gate, &mut instrument, &mut timers, Duration::from_secs(10));
        assert_eq!(instrument.hits().len(), hits);
    }

    #[test]
    fn test_revoked_session_halts() {
        let gate = SessionGate::new();
        let session = gate.issue();
        let mut instrument = RecordingInstrument::new();
        let mut timers = TimerQueue::new();
        let mut sequencer = PercussionSequencer::new();
        let clock = TransportClock::new(Duration::ZERO, Tempo::new(120.0).unwrap());

        sequencer.start(session, clock, DrumPattern::Jazz, &mut timers);
        gate.revoke_all();
        run_until(&mut sequencer, &gate, &mut instrument, &mut timers, Duration::from_secs(1));

        assert!(instrument.hits().is_empty());
        assert!(!sequencer.is_running());
        assert!(timers.is_empty());
    }
}
