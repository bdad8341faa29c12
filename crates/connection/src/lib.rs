//! Connection lifecycle controller for the boop client.
//!
//! Drives the backend connection to an authenticated state, retries
//! transient failures at a fixed interval, surfaces terminal failures to
//! the user, and reconnects on its own when the backend reports that the
//! relay connection dropped.

mod attempt;
pub mod controller;
pub mod error;
pub mod gateway;
mod listeners;
mod retry;
pub mod types;

pub use controller::ConnectionController;
pub use error::ControllerError;
pub use gateway::{
    BusError, EventBus, EventReceiver, ListenGuard, Presenter, RpcError, RpcGateway, Subscription,
};
pub use types::{
    ConnectionAttemptState, ControllerEvent, Dialog, LifecyclePhase, Notification, RetryPolicy,
    SequenceKind, SequenceOutcome,
};
