//! Controller-owned attempt state and the scoped in-progress guard.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::{ConnectionAttemptState, LifecyclePhase, SequenceKind};

/// Shared cell holding the [`ConnectionAttemptState`].
///
/// The mutex is never held across an await point.
#[derive(Debug, Default)]
pub(crate) struct AttemptCell {
    state: Mutex<ConnectionAttemptState>,
}

impl AttemptCell {
    fn lock(&self) -> MutexGuard<'_, ConnectionAttemptState> {
        // A poisoned lock only means a panic happened mid-update; the state
        // itself is plain data and still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn snapshot(&self) -> ConnectionAttemptState {
        self.lock().clone()
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Acquires the in-progress guard if no loop is running.
    pub(crate) fn try_begin(self: &Arc<Self>, kind: SequenceKind) -> Option<AttemptGuard> {
        let mut state = self.lock();
        if state.in_progress {
            return None;
        }
        Some(self.begin_locked(&mut state, kind))
    }

    /// Handles a `Disconnected` status report.
    ///
    /// Only a drop of a connection we believed to be up re-arms the
    /// controller; reports that arrive while a loop runs are coalesced.
    pub(crate) fn on_disconnect(self: &Arc<Self>) -> DisconnectAction {
        let mut state = self.lock();
        let was_connected = std::mem::replace(&mut state.connected, false);
        if state.in_progress {
            return DisconnectAction::Coalesced;
        }
        if !was_connected {
            return DisconnectAction::NotConnected;
        }
        DisconnectAction::Reconnect(self.begin_locked(&mut state, SequenceKind::Reconnect))
    }

    fn begin_locked(
        self: &Arc<Self>,
        state: &mut ConnectionAttemptState,
        kind: SequenceKind,
    ) -> AttemptGuard {
        state.in_progress = true;
        state.attempts_made = 0;
        state.phase = LifecyclePhase::Attempting(kind);
        AttemptGuard {
            cell: self.clone(),
            kind,
            finished: false,
        }
    }
}

/// What a `Disconnected` report should lead to.
#[derive(Debug)]
pub(crate) enum DisconnectAction {
    /// Start a reconnect loop holding this guard.
    Reconnect(AttemptGuard),
    /// A loop is already running; the report is dropped.
    Coalesced,
    /// We were not connected, so there is nothing to re-establish.
    NotConnected,
}

/// Proof that the holder owns the single running retry loop.
///
/// Dropping the guard clears `in_progress` on every exit path. A guard
/// dropped without [`AttemptGuard::finish`] leaves the phase at `Failed`.
#[derive(Debug)]
pub(crate) struct AttemptGuard {
    cell: Arc<AttemptCell>,
    kind: SequenceKind,
    finished: bool,
}

impl AttemptGuard {
    pub(crate) fn kind(&self) -> SequenceKind {
        self.kind
    }

    /// Records one more attempt and returns the new count.
    pub(crate) fn record_attempt(&self) -> u32 {
        let mut state = self.cell.lock();
        state.attempts_made = state.attempts_made.saturating_add(1);
        state.attempts_made
    }

    /// Ends the loop with the given result and releases the guard.
    pub(crate) fn finish(mut self, connected: bool) {
        {
            let mut state = self.cell.lock();
            state.connected = connected;
            state.phase = if connected {
                LifecyclePhase::Connected
            } else {
                LifecyclePhase::Failed
            };
            state.in_progress = false;
        }
        self.finished = true;
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut state = self.cell.lock();
        state.in_progress = false;
        state.phase = LifecyclePhase::Failed;
    }
}
