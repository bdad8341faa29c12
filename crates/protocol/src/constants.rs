use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout for invoke requests sent to the backend.
///
/// `connect` covers DNS, TCP, TLS and the login handshake on the backend
/// side, so it is generous.
pub const BRIDGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted line length on the bridge (1 MiB).
pub const BRIDGE_MAX_LINE_SIZE: usize = 1024 * 1024;

/// Event emitted by the backend whenever the relay connection changes state.
pub const EVENT_CONNECTION_STATE_CHANGED: &str = "connection-state-changed";
/// Event emitted by the backend for runtime errors the user should see.
pub const EVENT_BACKEND_ERROR: &str = "backend-error";
/// Event emitted when a partner booped us.
pub const EVENT_BOOPED: &str = "booped";
/// Event emitted when a single partner goes online or away.
pub const EVENT_PARTNER_STATUS_CHANGED: &str = "partner-status-changed";
/// Event emitted with the full partner list.
pub const EVENT_PARTNERS_UPDATE: &str = "partners-update";

/// Bridge message type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    // Invokes from client to backend
    #[serde(rename = "connect")]
    Connect,
    #[serde(rename = "disconnect")]
    Disconnect,

    // Responses from backend to client
    #[serde(rename = "reply")]
    Reply,
    #[serde(rename = "error")]
    Error,

    // Events from backend to client (push notifications)
    #[serde(rename = "connection-state-changed")]
    ConnectionStateChanged,
    #[serde(rename = "backend-error")]
    BackendError,
    #[serde(rename = "booped")]
    Booped,
    #[serde(rename = "partner-status-changed")]
    PartnerStatusChanged,
    #[serde(rename = "partners-update")]
    PartnersUpdate,

    /// Forward compatibility: unknown message types deserialize here.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// Returns the event name for push-event types, `None` otherwise.
    pub fn event_name(&self) -> Option<&'static str> {
        match self {
            MessageType::ConnectionStateChanged => Some(EVENT_CONNECTION_STATE_CHANGED),
            MessageType::BackendError => Some(EVENT_BACKEND_ERROR),
            MessageType::Booped => Some(EVENT_BOOPED),
            MessageType::PartnerStatusChanged => Some(EVENT_PARTNER_STATUS_CHANGED),
            MessageType::PartnersUpdate => Some(EVENT_PARTNERS_UPDATE),
            _ => None,
        }
    }

    /// Whether this type answers a pending invoke.
    pub fn is_response(&self) -> bool {
        matches!(self, MessageType::Reply | MessageType::Error)
    }
}
