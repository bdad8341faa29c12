//! Connection lifecycle controller.
//!
//! Owns the attempt state, runs the initial-connect sequence on request and
//! a reconnect sequence whenever the backend reports an unexpected
//! disconnect. At most one retry loop runs at a time.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use boop_protocol::ConnectionStatus;

use crate::attempt::AttemptCell;
use crate::error::ControllerError;
use crate::gateway::{EventBus, ListenGuard, Presenter, RpcGateway};
use crate::listeners;
use crate::retry::run_sequence;
use crate::types::{
    ConnectionAttemptState, ControllerEvent, RetryPolicy, SequenceKind, SequenceOutcome,
};

/// Capacity of the controller event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Shared state passed to the retry loop and the listener tasks.
pub(crate) struct ControllerContext<G, B, P> {
    pub(crate) gateway: G,
    pub(crate) bus: B,
    pub(crate) presenter: P,
    pub(crate) initial_policy: RetryPolicy,
    pub(crate) reconnect_policy: RetryPolicy,
    pub(crate) attempts: Arc<AttemptCell>,
    /// Release guards of the registered listeners. `None` until registered.
    pub(crate) listeners: Mutex<Option<Vec<ListenGuard>>>,
    pub(crate) last_status: Mutex<Option<ConnectionStatus>>,
    pub(crate) events_tx: mpsc::Sender<ControllerEvent>,
    /// Cancelled by `teardown`; every task checks it before acting.
    pub(crate) cancel: CancellationToken,
}

impl<G, B, P> ControllerContext<G, B, P> {
    pub(crate) fn policy_for(&self, kind: SequenceKind) -> &RetryPolicy {
        match kind {
            SequenceKind::Initial => &self.initial_policy,
            SequenceKind::Reconnect => &self.reconnect_policy,
        }
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn is_listening(&self) -> bool {
        self.listeners
            .lock()
            .map(|l| l.is_some())
            .unwrap_or_else(|e| e.into_inner().is_some())
    }

    pub(crate) fn set_last_status(&self, status: ConnectionStatus) {
        match self.last_status.lock() {
            Ok(mut s) => *s = Some(status),
            Err(e) => *e.into_inner() = Some(status),
        }
    }

    /// Emits an event without waiting; dropped if nobody drains the channel.
    pub(crate) fn emit(&self, event: ControllerEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            trace!("dropping controller event: {e}");
        }
    }
}

/// Drives the backend connection for one application session.
///
/// Cloning is cheap; all clones share the same attempt state and guard.
pub struct ConnectionController<G, B, P> {
    ctx: Arc<ControllerContext<G, B, P>>,
    events_rx: Arc<tokio::sync::Mutex<Option<mpsc::Receiver<ControllerEvent>>>>,
}

impl<G, B, P> Clone for ConnectionController<G, B, P> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            events_rx: self.events_rx.clone(),
        }
    }
}

impl<G, B, P> ConnectionController<G, B, P>
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    /// Creates a controller with the default initial and reconnect policies.
    pub fn new(gateway: G, bus: B, presenter: P) -> Self {
        Self::with_policies(
            gateway,
            bus,
            presenter,
            RetryPolicy::initial_connect(),
            RetryPolicy::reconnect(),
        )
    }

    /// Creates a controller with explicit retry policies.
    pub fn with_policies(
        gateway: G,
        bus: B,
        presenter: P,
        initial_policy: RetryPolicy,
        reconnect_policy: RetryPolicy,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            ctx: Arc::new(ControllerContext {
                gateway,
                bus,
                presenter,
                initial_policy,
                reconnect_policy,
                attempts: Arc::new(AttemptCell::default()),
                listeners: Mutex::new(None),
                last_status: Mutex::new(None),
                events_tx,
                cancel: CancellationToken::new(),
            }),
            events_rx: Arc::new(tokio::sync::Mutex::new(Some(events_rx))),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<ControllerEvent>> {
        self.events_rx.lock().await.take()
    }

    /// Runs the initial-connect sequence unless a loop is already running.
    ///
    /// Returns [`SequenceOutcome::AlreadyRunning`] without issuing any RPC
    /// call when another loop holds the guard. On success the event
    /// listeners are registered (once per controller) before the guard is
    /// released; a registration failure is returned as an error.
    pub async fn init_connection(&self) -> Result<SequenceOutcome, ControllerError> {
        if self.ctx.is_torn_down() {
            return Err(ControllerError::TornDown);
        }

        let Some(guard) = self.ctx.attempts.try_begin(SequenceKind::Initial) else {
            debug!("connection attempt already in progress, ignoring");
            return Ok(SequenceOutcome::AlreadyRunning);
        };

        run_sequence(&self.ctx, guard).await
    }

    /// Registers the `backend-error` and `connection-state-changed`
    /// listeners.
    ///
    /// Fails with [`ControllerError::AlreadyListening`] when they are
    /// already registered. A listen failure releases whatever was
    /// registered so far and is returned to the caller.
    pub async fn init_notifications(&self) -> Result<(), ControllerError> {
        listeners::register(&self.ctx).await
    }

    /// Cancels the controller and releases every event subscription.
    ///
    /// In-flight connect calls may still resolve; their results are
    /// ignored. Calling this more than once is a no-op.
    pub fn teardown(&self) {
        if !self.ctx.cancel.is_cancelled() {
            info!("tearing down connection controller");
        }
        self.ctx.cancel.cancel();

        let guards = match self.ctx.listeners.lock() {
            Ok(mut l) => l.take(),
            Err(e) => e.into_inner().take(),
        };
        for guard in guards.into_iter().flatten() {
            debug!(event = guard.event(), "unlistening");
            guard.unlisten();
        }
    }

    /// Snapshot of the attempt state.
    pub fn attempt_state(&self) -> ConnectionAttemptState {
        self.ctx.attempts.snapshot()
    }

    /// Whether a retry loop currently holds the guard.
    pub fn is_attempting(&self) -> bool {
        self.ctx.attempts.snapshot().in_progress
    }

    /// Whether the event listeners are registered.
    pub fn is_listening(&self) -> bool {
        self.ctx.is_listening()
    }

    /// Whether `teardown` has been called.
    pub fn is_torn_down(&self) -> bool {
        self.ctx.is_torn_down()
    }

    /// Last status the backend reported, if any.
    pub fn last_status(&self) -> Option<ConnectionStatus> {
        match self.ctx.last_status.lock() {
            Ok(s) => *s,
            Err(e) => *e.into_inner(),
        }
    }

    pub fn initial_policy(&self) -> &RetryPolicy {
        &self.ctx.initial_policy
    }

    pub fn reconnect_policy(&self) -> &RetryPolicy {
        &self.ctx.reconnect_policy
    }

    /// The RPC gateway this controller drives.
    pub fn gateway(&self) -> &G {
        &self.ctx.gateway
    }
}
