//! Boundary contracts the controller consumes: the RPC gateway, the event
//! bus and the user-facing presenter.

use std::future::Future;

use tokio::sync::mpsc;

use crate::types::{Dialog, Notification};

/// Errors from an invoke-style call into the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("bridge closed")]
    Closed,

    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors from registering an event listener.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("event bus closed")]
    Closed,

    #[error("failed to listen to {event}: {reason}")]
    Listen { event: String, reason: String },
}

/// Request/response bridge into the native backend.
pub trait RpcGateway: Send + Sync + 'static {
    /// Opens the relay connection and logs in.
    ///
    /// Resolves `Ok(true)` when the login was accepted, `Ok(false)` when the
    /// remote party refused the credentials, and `Err` on transport failure.
    fn connect(&self) -> impl Future<Output = Result<bool, RpcError>> + Send;

    /// Closes the relay connection gracefully. Best-effort.
    fn disconnect(&self) -> impl Future<Output = Result<(), RpcError>> + Send;
}

/// Subscribe-style push channel from the backend.
pub trait EventBus: Send + Sync + 'static {
    /// Registers a listener for `event`. The returned handle owns the
    /// registration; dropping its guard unlistens.
    fn listen(&self, event: &str) -> impl Future<Output = Result<Subscription, BusError>> + Send;
}

/// User-facing presentation boundary.
pub trait Presenter: Send + Sync + 'static {
    /// Shows a blocking dialog and resolves once the user acknowledged it.
    fn show_dialog(&self, dialog: Dialog) -> impl Future<Output = ()> + Send;

    /// Sends a non-blocking notification.
    fn send_notification(&self, notification: Notification);
}

/// Receiving half of a subscription: raw JSON payloads of one event.
pub type EventReceiver = mpsc::UnboundedReceiver<serde_json::Value>;

/// Releases an event registration when dropped.
pub struct ListenGuard {
    event: String,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenGuard {
    pub fn new(event: impl Into<String>, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            event: event.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Event this guard is registered for.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Unlistens now instead of at drop.
    pub fn unlisten(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenGuard {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for ListenGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenGuard")
            .field("event", &self.event)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// An active listener registration returned by [`EventBus::listen`].
#[derive(Debug)]
pub struct Subscription {
    receiver: EventReceiver,
    guard: ListenGuard,
}

impl Subscription {
    pub fn new(receiver: EventReceiver, guard: ListenGuard) -> Self {
        Self { receiver, guard }
    }

    pub fn event(&self) -> &str {
        self.guard.event()
    }

    /// Waits for the next payload. `None` once the bus dropped the sender.
    pub async fn recv(&mut self) -> Option<serde_json::Value> {
        self.receiver.recv().await
    }

    /// Splits the handle so the receiver can move into a task while the
    /// owner keeps the guard.
    pub fn into_parts(self) -> (EventReceiver, ListenGuard) {
        (self.receiver, self.guard)
    }
}
