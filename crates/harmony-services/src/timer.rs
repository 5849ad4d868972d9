//! Cancellable timer queue for scheduled continuations

use std::collections::BTreeMap;
use std::time::Duration;

/// Handle for cancelling a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId {
    due: Duration,
    seq: u64,
}

impl TimerId {
    pub fn due(&self) -> Duration {
        self.due
    }
}

/// Timers ordered by due time, then by scheduling order
#[derive(Debug)]
pub struct TimerQueue<T> {
    entries: BTreeMap<TimerId, T>,
    next_seq: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_seq: 0,
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, payload: T) -> TimerId {
        let id = TimerId {
            due,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(id, payload);
        id
    }

    /// Remove a pending timer. Returns its payload if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        self.entries.remove(&id)
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.keys().next().map(|id| id.due)
    }

    /// Take the earliest timer if it is due at `now`
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerId, T)> {
        let first = self.entries.first_key_value().map(|(id, _)| *id)?;
        if first.due > now {
            return None;
        }
        self.entries.remove_entry(&first)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
