//! Payloads of the push events the backend emits.

use serde::{Deserialize, Serialize};

/// Relay connection status as broadcast by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    Disconnected = -1,
    Connecting = 0,
    Connected = 1,
}

/// Raised when a status payload carries a value outside `-1..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown connection status {0}")]
pub struct UnknownStatus(pub i8);

impl TryFrom<i8> for ConnectionStatus {
    type Error = UnknownStatus;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(ConnectionStatus::Disconnected),
            0 => Ok(ConnectionStatus::Connecting),
            1 => Ok(ConnectionStatus::Connected),
            other => Err(UnknownStatus(other)),
        }
    }
}

impl From<ConnectionStatus> for i8 {
    fn from(status: ConnectionStatus) -> Self {
        status as i8
    }
}

/// Payload of `connection-state-changed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatusPayload {
    pub status: i8,
}

impl ConnectionStatusPayload {
    pub fn status(&self) -> Result<ConnectionStatus, UnknownStatus> {
        ConnectionStatus::try_from(self.status)
    }
}

impl From<ConnectionStatus> for ConnectionStatusPayload {
    fn from(status: ConnectionStatus) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Payload of `backend-error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendErrorPayload {
    pub message: String,
}
