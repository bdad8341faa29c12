use std::sync::{Mutex, MutexGuard};

use crate::event_log::EventLog;
use crate::indicator::StatusIndicator;
use crate::presenter::TerminalPresenter;

/// What the shell shows about the session, shared by the event loop and
/// the command handler.
#[derive(Default)]
pub struct ShellState {
    indicator: Mutex<StatusIndicator>,
    log: Mutex<EventLog>,
    pub presenter: TerminalPresenter,
}

impl ShellState {
    pub fn new(presenter: TerminalPresenter) -> Self {
        Self {
            presenter,
            ..Self::default()
        }
    }

    pub fn indicator(&self) -> MutexGuard<'_, StatusIndicator> {
        self.indicator.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn log(&self) -> MutexGuard<'_, EventLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}
