//! Error types for the connection lifecycle controller.

use crate::gateway::BusError;

/// Errors the controller propagates to its owner.
///
/// Transient connect failures never surface here; they are retried and end
/// in a [`SequenceOutcome`](crate::SequenceOutcome) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// Listener registration failed. Fatal for the session.
    #[error("event subscription failed: {0}")]
    Subscription(#[from] BusError),

    #[error("event listeners are already registered")]
    AlreadyListening,

    #[error("controller has been torn down")]
    TornDown,
}
