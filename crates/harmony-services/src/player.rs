//! Threaded control surface around the scheduler
//!
//! A single clock thread owns the scheduler and the instrument. Callers talk
//! to it over a command channel and hear back through playback events. The
//! session gate is shared, so `start` and `stop` take effect on the token
//! before the clock thread has even seen the command.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use harmony_core::PlaybackRequest;
use thiserror::Error;
use tracing::{debug, info};

use crate::instrument::Instrument;
use crate::scheduler::{PlaybackEvent, PlayerConfig, Scheduler};
use crate::session::{SessionGate, SessionId};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Failed to spawn clock thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Clock thread is not running")]
    Disconnected,
}

enum Command {
    Start { id: SessionId, request: PlaybackRequest },
    Stop,
    Shutdown,
}

pub struct Player {
    gate: Arc<SessionGate>,
    commands: Sender<Command>,
    events: Receiver<PlaybackEvent>,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Spawn the clock thread. The instrument moves onto it for good.
    pub fn spawn<I: Instrument + 'static>(instrument: I, config: PlayerConfig) -> Result<Self, PlayerError> {
        let gate = Arc::new(SessionGate::new());
        let (commands, command_rx) = unbounded();
        let (event_tx, events) = unbounded();

        let scheduler = Scheduler::with_gate(instrument, config, gate.clone());
        let thread = thread::Builder::new()
            .name("harmony-clock".into())
            .spawn(move || run_clock(scheduler, command_rx, event_tx))?;

        info!(articulation = config.articulation.ratio(), "Player started");
        Ok(Self {
            gate,
            commands,
            events,
            thread: Some(thread),
        })
    }

    /// Begin a new session, superseding any other. Returns at once; progress
    /// and failures arrive as events.
    pub fn start(&self, request: PlaybackRequest) -> Result<SessionId, PlayerError> {
        let id = self.gate.issue();
        self.commands
            .send(Command::Start { id, request })
            .map_err(|_| PlayerError::Disconnected)?;
        Ok(id)
    }

    /// Stop the live session. No attack can begin once this returns.
    pub fn stop(&self) {
        if let Some(id) = self.gate.revoke_all() {
            debug!(session = %id, "Stop requested");
        }
        // Teardown still has to run on the clock thread to release voices
        let _ = self.commands.send(Command::Stop);
    }

    pub fn is_playing(&self) -> bool {
        self.gate.current().is_some()
    }

    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.events
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_clock<I: Instrument>(
    mut scheduler: Scheduler<I>,
    commands: Receiver<Command>,
    events: Sender<PlaybackEvent>,
) {
    let origin = Instant::now();

    loop {
        let received = match scheduler.next_deadline() {
            Some(deadline) => commands.recv_deadline(origin + deadline),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let shutdown = match received {
            Ok(Command::Start { id, request }) => {
                scheduler.begin(id, request, origin.elapsed());
                false
            }
            Ok(Command::Stop) => {
                scheduler.retire_stale();
                false
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                scheduler.stop();
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        };

        if !shutdown {
            scheduler.advance(origin.elapsed());
        }
        for event in scheduler.take_events() {
            // Nobody listening is fine
            let _ = events.send(event);
        }
        if shutdown {
            break;
        }
    }

    debug!("Clock thread exiting");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use harmony_core::{ChordSpec, DrumConfig, DrumPattern, Tempo, Tonic};

    use super::*;
    use crate::instrument::RecordingInstrument;

    const WAIT: Duration = Duration::from_secs(5);

    fn request(symbols: &[&str], bpm: f64, drums: DrumConfig) -> PlaybackRequest {
        PlaybackRequest::new(
            symbols.iter().map(|s| ChordSpec::symbolic(*s, 1.0)).collect(),
            Tempo::new(bpm).unwrap(),
            Tonic::default(),
            drums,
        )
    }

    /// Collect events until the terminal event of `session`
    fn wait_for_end(player: &Player, session: SessionId) -> Vec<PlaybackEvent> {
        let mut seen = Vec::new();
        loop {
            let event = player.events().recv_timeout(WAIT).unwrap();
            let done = event.session() == session && event.is_terminal();
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    #[test]
    fn test_plays_to_completion() {
        let recorder = RecordingInstrument::new();
        let player = Player::spawn(recorder.clone(), PlayerConfig::default()).unwrap();

        let id = player
            .start(request(&["I", "IV", "V", "I"], 6000.0, DrumConfig::enabled(DrumPattern::Basic)))
            .unwrap();
        assert!(player.is_playing());

        let events = wait_for_end(&player, id);
        assert_eq!(events.last(), Some(&PlaybackEvent::Completed { session: id }));
        assert_eq!(recorder.attacks().len(), 4);
        assert_eq!(recorder.sounding_voices(), 0);
        assert!(!player.is_playing());
    }

    #[test]
    fn test_stop_takes_effect_immediately() {
        let recorder = RecordingInstrument::new();
        let player = Player::spawn(recorder.clone(), PlayerConfig::default()).unwrap();

        let id = player.start(request(&["I", "V", "vi", "IV"], 30.0, DrumConfig::disabled())).unwrap();
        let first = player.events().recv_timeout(WAIT).unwrap();
        assert_eq!(first, PlaybackEvent::Started { session: id, chords: 4 });
        let attacked = player.events().recv_timeout(WAIT).unwrap();
        assert!(matches!(attacked, PlaybackEvent::ChordAttacked { index: 0, .. }));

        player.stop();
        assert!(!player.is_playing());
        player.stop();

        let events = wait_for_end(&player, id);
        assert_eq!(events.last(), Some(&PlaybackEvent::Aborted { session: id }));
        assert_eq!(recorder.sounding_voices(), 0);
        assert_eq!(recorder.attacks().len(), 1);
    }

    #[test]
    fn test_new_start_supersedes() {
        let recorder = RecordingInstrument::new();
        let player = Player::spawn(recorder.clone(), PlayerConfig::default()).unwrap();

        let slow = player.start(request(&["I", "IV", "V"], 20.0, DrumConfig::disabled())).unwrap();
        let fast = player.start(request(&["vi", "ii"], 6000.0, DrumConfig::disabled())).unwrap();
        assert_ne!(slow, fast);

        let events = wait_for_end(&player, fast);
        assert!(events.contains(&PlaybackEvent::Aborted { session: slow }));

        // The slow session may have sounded its first chord, never anything
        // once the fast one began
        let late_slow = events
            .iter()
            .skip_while(|event| !matches!(event, PlaybackEvent::Started { session, .. } if *session == fast))
            .filter(|event| event.session() == slow)
            .count();
        assert_eq!(late_slow, 0);
        assert!(recorder.attacks().len() <= 3);
        assert_eq!(recorder.sounding_voices(), 0);
    }

    #[test]
    fn test_unplayable_chord_leaves_player_usable() {
        let recorder = RecordingInstrument::new();
        let player = Player::spawn(recorder.clone(), PlayerConfig::default()).unwrap();

        let broken = PlaybackRequest::new(
            vec![ChordSpec::symbolic("I", 1e20)],
            Tempo::new(120.0).unwrap(),
            Tonic::default(),
            DrumConfig::enabled(DrumPattern::Basic),
        );
        let id = player.start(broken).unwrap();
        let events = wait_for_end(&player, id);
        assert!(matches!(events.last(), Some(PlaybackEvent::Failed { .. })));
        assert!(!player.is_playing());

        let next = player.start(request(&["V"], 6000.0, DrumConfig::disabled())).unwrap();
        let events = wait_for_end(&player, next);
        assert_eq!(events.last(), Some(&PlaybackEvent::Completed { session: next }));
        assert_eq!(recorder.attacks().len(), 1);
    }

    #[test]
    fn test_drop_releases_voices() {
        let recorder = RecordingInstrument::new();
        {
            let player = Player::spawn(recorder.clone(), PlayerConfig::default()).unwrap();
            player.start(request(&["I"], 10.0, DrumConfig::disabled())).unwrap();
            let _ = player.events().recv_timeout(WAIT);
            let _ = player.events().recv_timeout(WAIT);
        }
        assert_eq!(recorder.sounding_voices(), 0);
        assert_eq!(recorder.attacks().len(), 1);
    }
}
