//! Public types for the connection lifecycle controller.

use std::time::Duration;

use boop_protocol::ConnectionStatus;

/// Fixed-interval retry configuration for one connect sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between a failed attempt and the next one.
    pub interval: Duration,
    /// Upper bound on attempts. `None` keeps trying until success or teardown.
    pub max_attempts: Option<u32>,
    /// Whether running out of attempts raises a user-facing notification.
    pub notify_on_exhaustion: bool,
}

impl RetryPolicy {
    /// Policy for the first connect of a session: 10 attempts, 1 s apart.
    pub fn initial_connect() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_attempts: Some(10),
            notify_on_exhaustion: true,
        }
    }

    /// Policy after an unexpected mid-session disconnect: 30 attempts, 2 s apart.
    pub fn reconnect() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: Some(30),
            notify_on_exhaustion: true,
        }
    }

    /// Returns `true` once `attempts_made` has used up the budget.
    pub fn is_exhausted(&self, attempts_made: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts_made >= max)
    }
}

/// Which of the two connect sequences is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    /// Started by the shell through `init_connection`.
    Initial,
    /// Started by a `Disconnected` status event.
    Reconnect,
}

impl std::fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceKind::Initial => f.write_str("initial"),
            SequenceKind::Reconnect => f.write_str("reconnect"),
        }
    }
}

/// Where the controller currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// No sequence has run yet.
    Idle,
    /// A retry loop is running.
    Attempting(SequenceKind),
    /// The last sequence ended with an accepted login.
    Connected,
    /// The last sequence ended with refusal, exhaustion or cancellation.
    Failed,
}

/// Snapshot of the controller-owned attempt state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttemptState {
    /// A retry loop is currently running. This is the mutual-exclusion guard.
    pub in_progress: bool,
    /// Last known connect result.
    pub connected: bool,
    /// Attempts made by the current (or last) sequence.
    pub attempts_made: u32,
    pub phase: LifecyclePhase,
}

impl Default for ConnectionAttemptState {
    fn default() -> Self {
        Self {
            in_progress: false,
            connected: false,
            attempts_made: 0,
            phase: LifecyclePhase::Idle,
        }
    }
}

/// How a call to `init_connection` (or a reconnect loop) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Another loop held the guard; nothing was attempted.
    AlreadyRunning,
    /// The backend accepted the login.
    Connected { attempts: u32 },
    /// The remote party refused the credentials.
    Refused { attempts: u32 },
    /// Every attempt failed at the transport level.
    Exhausted { attempts: u32 },
    /// The controller was torn down while the loop ran.
    Cancelled { attempts: u32 },
}

/// A blocking modal the user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub title: String,
    pub text: String,
}

impl Dialog {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    /// Shown when the relay refuses the configured credentials.
    pub fn credentials_refused() -> Self {
        Self::new(
            "Login credentials refused (>_<)",
            "Please change your settings and try again. If the problem persists, \
             something more serious might be going on.",
        )
    }

    /// Shown for an error message pushed by the backend.
    pub fn backend_error(message: &str) -> Self {
        Self::new("Error", format!("An error occurred: {message}"))
    }
}

/// A non-blocking system notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Sent when a sequence runs out of attempts.
    pub fn connection_failed() -> Self {
        Self::new(
            "Connection failed",
            "All connection attempts to the boop server failed. \
             Please check your settings and internet connection.",
        )
    }
}

/// Events emitted by the controller for the shell to observe.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// A retry loop acquired the guard.
    SequenceStarted { kind: SequenceKind },
    /// One attempt failed at the transport level.
    AttemptFailed {
        kind: SequenceKind,
        attempt: u32,
        error: String,
        next_retry: Option<std::time::Duration>,
    },
    /// A retry loop finished.
    SequenceFinished {
        kind: SequenceKind,
        outcome: SequenceOutcome,
    },
    /// The backend reported a connection status change.
    StatusChanged(ConnectionStatus),
    /// A disconnect arrived while a loop held the guard and was dropped.
    DisconnectCoalesced,
    /// The backend pushed an error message.
    BackendError(String),
    /// Event listeners were registered.
    Listening,
}
