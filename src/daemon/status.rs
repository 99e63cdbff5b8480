//! Observable daemon state with blocking waits.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Run state of a named service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DaemonState {
    /// Not running (also the state of a service never seen).
    #[default]
    Stopped,
    /// Running.
    Running,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonState::Stopped => write!(f, "stopped"),
            DaemonState::Running => write!(f, "running"),
        }
    }
}

/// Per-service state table that waiters can block on.
#[derive(Debug, Default)]
pub struct DaemonStatus {
    states: Mutex<HashMap<String, DaemonState>>,
    changed: Condvar,
}

impl DaemonStatus {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of `name`.
    pub fn get(&self, name: &str) -> DaemonState {
        self.lock().get(name).copied().unwrap_or_default()
    }

    /// Record a new state for `name` and wake all waiters.
    pub fn set(&self, name: &str, state: DaemonState) {
        self.lock().insert(name.to_string(), state);
        self.changed.notify_all();
    }

    /// Block until `name` reaches `state` or `timeout` elapses.
    ///
    /// Returns whether the state was reached.
    pub fn wait_for(&self, name: &str, state: DaemonState, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |states| {
                states.get(name).copied().unwrap_or_default() != state
            })
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(name).copied().unwrap_or_default() == state
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DaemonState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
