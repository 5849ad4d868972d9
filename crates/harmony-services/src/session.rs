//! Session tokens and attack rights
//!
//! Exactly one session token is current at a time. Issuing a new token
//! invalidates the previous one immediately, and every scheduled continuation
//! re-checks its token before it touches the instrument.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Identifier of one playback session. Monotonically increasing, never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Holder of the current session token, shared between the control surface
/// and the clock thread.
#[derive(Debug)]
pub struct SessionGate {
    current: Mutex<Option<SessionId>>,
    next: AtomicU64,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
            next: AtomicU64::new(1),
        }
    }
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<SessionId>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocate a new token and make it current, superseding any other
    pub fn issue(&self) -> SessionId {
        let mut current = self.lock();
        let id = SessionId(self.next.fetch_add(1, Ordering::SeqCst));
        *current = Some(id);
        id
    }

    /// Clear the current token if it is still `id`. Returns whether it was.
    pub fn revoke(&self, id: SessionId) -> bool {
        let mut current = self.lock();
        if *current == Some(id) {
            *current = None;
            true
        } else {
            false
        }
    }

    /// Clear whatever token is current
    pub fn revoke_all(&self) -> Option<SessionId> {
        self.lock().take()
    }

    pub fn current(&self) -> Option<SessionId> {
        *self.lock()
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.current() == Some(id)
    }

    /// Run `f` only while `id` holds the current token. The token cannot be
    /// revoked or superseded until `f` returns.
    pub fn with_rights<R>(&self, id: SessionId, f: impl FnOnce() -> R) -> Option<R> {
        let current = self.lock();
        if *current != Some(id) {
            return None;
        }
        let result = f();
        drop(current);
        Some(result)
    }
}
