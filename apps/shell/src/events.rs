//! Mirrors controller events into the indicator, the log and status
//! notifications.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use boop_connection::{ControllerEvent, SequenceOutcome};
use boop_notices::NoticeLevel;
use boop_protocol::ConnectionStatus;

use crate::state::ShellState;

/// Drains controller events until the controller is dropped.
pub async fn event_loop(mut rx: mpsc::Receiver<ControllerEvent>, state: Arc<ShellState>) {
    while let Some(event) = rx.recv().await {
        apply(&state, &event);
    }
    debug!("controller event stream ended");
}

/// Applies one controller event to the shell state.
pub fn apply(state: &ShellState, event: &ControllerEvent) {
    match event {
        ControllerEvent::StatusChanged(status) => {
            let changed = state.indicator().update(*status);
            state.log().push(format!("Connection status: {}", describe_status(*status)));
            if changed {
                match status {
                    ConnectionStatus::Connected => {
                        state.presenter.notify(
                            NoticeLevel::Success,
                            "Connected",
                            "Connected to boop server",
                        );
                    }
                    ConnectionStatus::Disconnected => {
                        state.presenter.notify(
                            NoticeLevel::Warning,
                            "Disconnected",
                            "Disconnected from boop server",
                        );
                    }
                    ConnectionStatus::Connecting => {}
                }
            }
        }
        ControllerEvent::SequenceStarted { kind } => {
            state.log().push(format!("Starting {kind} connection sequence"));
        }
        ControllerEvent::AttemptFailed {
            kind,
            attempt,
            error,
            next_retry,
        } => {
            let tail = match next_retry {
                Some(wait) => format!("retrying in {} ms", wait.as_millis()),
                None => "giving up".to_string(),
            };
            state
                .log()
                .push(format!("{kind} attempt {attempt} failed: {error}; {tail}"));
        }
        ControllerEvent::SequenceFinished { kind, outcome } => {
            state.log().push(format!("{kind} sequence {}", describe_outcome(outcome)));
        }
        ControllerEvent::DisconnectCoalesced => {
            state
                .log()
                .push("Disconnect reported while already connecting, ignored");
        }
        ControllerEvent::BackendError(message) => {
            state.log().push(format!("Backend error: {message}"));
        }
        ControllerEvent::Listening => {
            state.log().push("Listening to backend events");
        }
    }
}

fn describe_status(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
    }
}

fn describe_outcome(outcome: &SequenceOutcome) -> String {
    match outcome {
        SequenceOutcome::AlreadyRunning => "skipped, another sequence is running".into(),
        SequenceOutcome::Connected { attempts } => format!("connected after {attempts} attempt(s)"),
        SequenceOutcome::Refused { .. } => "ended: login credentials refused".into(),
        SequenceOutcome::Exhausted { attempts } => {
            format!("failed after {attempts} attempt(s)")
        }
        SequenceOutcome::Cancelled { .. } => "cancelled".into(),
    }
}
