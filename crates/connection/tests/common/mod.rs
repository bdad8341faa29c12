//! Shared fakes for the controller integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use boop_connection::{
    BusError, ConnectionController, ControllerEvent, Dialog, EventBus, ListenGuard, Notification,
    Presenter, RetryPolicy, RpcError, RpcGateway, Subscription,
};

/// What one scripted `connect` call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Accept,
    Refuse,
    Fail,
}

#[derive(Default)]
struct GatewayState {
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<Option<Step>>,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<Instant>>,
    disconnects: AtomicUsize,
}

/// Scripted RPC gateway recording every `connect` call.
#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<GatewayState>,
}

impl FakeGateway {
    /// Replays `steps` in order, then keeps answering with `fallback`.
    pub fn scripted(steps: &[Step], fallback: Step) -> Self {
        let gw = Self::default();
        gw.state.script.lock().unwrap().extend(steps.iter().copied());
        *gw.state.fallback.lock().unwrap() = Some(fallback);
        gw
    }

    pub fn always(step: Step) -> Self {
        Self::scripted(&[], step)
    }

    pub fn push(&self, steps: &[Step]) {
        self.state.script.lock().unwrap().extend(steps.iter().copied());
    }

    pub fn set_fallback(&self, step: Step) {
        *self.state.fallback.lock().unwrap() = Some(step);
    }

    /// Latency of every following `connect` call.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.state.calls.lock().unwrap().len()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .or(*self.state.fallback.lock().unwrap())
            .unwrap_or(Step::Fail)
    }
}

impl RpcGateway for FakeGateway {
    async fn connect(&self) -> Result<bool, RpcError> {
        self.state.calls.lock().unwrap().push(Instant::now());
        let step = self.next_step();
        let delay = *self.state.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match step {
            Step::Accept => Ok(true),
            Step::Refuse => Ok(false),
            Step::Fail => Err(RpcError::Transport("connection refused".into())),
        }
    }

    async fn disconnect(&self) -> Result<(), RpcError> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct BusState {
    listeners: Mutex<HashMap<u64, (String, mpsc::UnboundedSender<serde_json::Value>)>>,
    next_id: AtomicU64,
    fail_on: Mutex<Option<String>>,
    listen_calls: AtomicUsize,
}

/// In-memory event bus the tests emit into.
#[derive(Clone, Default)]
pub struct FakeBus {
    state: Arc<BusState>,
}

impl FakeBus {
    /// Makes every `listen` for `event` fail.
    pub fn fail_on(&self, event: &str) {
        *self.state.fail_on.lock().unwrap() = Some(event.to_string());
    }

    /// Delivers `payload` to every listener of `event`; returns how many got it.
    pub fn emit(&self, event: &str, payload: serde_json::Value) -> usize {
        let listeners = self.state.listeners.lock().unwrap();
        listeners
            .values()
            .filter(|(name, _)| name == event)
            .filter(|(_, tx)| tx.send(payload.clone()).is_ok())
            .count()
    }

    pub fn emit_status(&self, status: i8) -> usize {
        self.emit(
            "connection-state-changed",
            serde_json::json!({ "status": status }),
        )
    }

    /// Number of registered listeners.
    pub fn active(&self) -> usize {
        self.state.listeners.lock().unwrap().len()
    }

    pub fn listen_calls(&self) -> usize {
        self.state.listen_calls.load(Ordering::SeqCst)
    }
}

impl EventBus for FakeBus {
    async fn listen(&self, event: &str) -> Result<Subscription, BusError> {
        self.state.listen_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_on.lock().unwrap().as_deref() == Some(event) {
            return Err(BusError::Listen {
                event: event.to_string(),
                reason: "injected failure".into(),
            });
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .listeners
            .lock()
            .unwrap()
            .insert(id, (event.to_string(), tx));

        let state = self.state.clone();
        let guard = ListenGuard::new(event, move || {
            state.listeners.lock().unwrap().remove(&id);
        });
        Ok(Subscription::new(rx, guard))
    }
}

/// Presenter that records what would have been shown.
#[derive(Clone, Default)]
pub struct RecordingPresenter {
    dialogs: Arc<Mutex<Vec<Dialog>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingPresenter {
    pub fn dialogs(&self) -> Vec<Dialog> {
        self.dialogs.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Presenter for RecordingPresenter {
    async fn show_dialog(&self, dialog: Dialog) {
        self.dialogs.lock().unwrap().push(dialog);
    }

    fn send_notification(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

pub type TestController = ConnectionController<FakeGateway, FakeBus, RecordingPresenter>;

pub fn policy(interval_ms: u64, max_attempts: Option<u32>) -> RetryPolicy {
    RetryPolicy {
        interval: Duration::from_millis(interval_ms),
        max_attempts,
        notify_on_exhaustion: true,
    }
}

/// Controller with a 3 x 1 s initial policy and a 2 x 2 s reconnect policy.
pub fn controller(
    gateway: &FakeGateway,
    bus: &FakeBus,
    presenter: &RecordingPresenter,
) -> TestController {
    ConnectionController::with_policies(
        gateway.clone(),
        bus.clone(),
        presenter.clone(),
        policy(1000, Some(3)),
        policy(2000, Some(2)),
    )
}

/// Waits for the first event matching `pred`, skipping the others.
pub async fn wait_for(
    rx: &mut mpsc::Receiver<ControllerEvent>,
    pred: impl Fn(&ControllerEvent) -> bool,
) -> ControllerEvent {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            let event = rx.recv().await.expect("controller event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for controller event")
}

/// Yields to other tasks until `cond` holds.
pub async fn eventually(cond: impl Fn() -> bool) {
    for _ in 0..1000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
