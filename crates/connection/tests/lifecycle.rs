mod common;

use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;

use boop_connection::{
    ControllerError, ControllerEvent, Dialog, LifecyclePhase, Notification, SequenceKind,
    SequenceOutcome,
};
use boop_protocol::ConnectionStatus;

use common::{
    FakeBus, FakeGateway, RecordingPresenter, Step, controller, eventually, wait_for,
};

fn is_reconnect_finished(event: &ControllerEvent) -> bool {
    matches!(
        event,
        ControllerEvent::SequenceFinished {
            kind: SequenceKind::Reconnect,
            ..
        }
    )
}

#[tokio::test(start_paused = true)]
async fn concurrent_init_runs_a_single_loop() {
    let gateway = FakeGateway::always(Step::Accept);
    gateway.set_delay(Duration::from_millis(100));
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    let outcomes = join_all((0..8).map(|_| ctrl.init_connection())).await;

    let connected = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(SequenceOutcome::Connected { attempts: 1 })))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, Ok(SequenceOutcome::AlreadyRunning)))
        .count();
    assert_eq!(connected, 1);
    assert_eq!(skipped, 7);
    assert_eq!(gateway.calls(), 1);
    assert!(!ctrl.is_attempting());
}

#[tokio::test(start_paused = true)]
async fn refusal_shows_dialog_and_is_not_retried() {
    let gateway = FakeGateway::always(Step::Refuse);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    let outcome = ctrl.init_connection().await.unwrap();
    assert_eq!(outcome, SequenceOutcome::Refused { attempts: 1 });

    // Nothing is scheduled afterwards.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.calls(), 1);

    assert_eq!(presenter.dialogs(), vec![Dialog::credentials_refused()]);
    assert!(presenter.notifications().is_empty());
    assert!(!ctrl.is_attempting());
    assert!(!ctrl.is_listening());
    assert_eq!(ctrl.attempt_state().phase, LifecyclePhase::Failed);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_then_success() {
    let gateway = FakeGateway::scripted(&[Step::Fail, Step::Fail], Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    let outcome = ctrl.init_connection().await.unwrap();

    assert_eq!(outcome, SequenceOutcome::Connected { attempts: 3 });
    assert_eq!(gateway.calls(), 3);
    assert!(presenter.notifications().is_empty());
    assert!(presenter.dialogs().is_empty());
    assert!(ctrl.is_listening());
    assert_eq!(bus.active(), 2);

    let state = ctrl.attempt_state();
    assert!(state.connected);
    assert!(!state.in_progress);
    assert_eq!(state.attempts_made, 3);
}

#[tokio::test(start_paused = true)]
async fn exhaustion_notifies_once_and_allows_manual_retry() {
    let gateway = FakeGateway::always(Step::Fail);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    let outcome = ctrl.init_connection().await.unwrap();
    assert_eq!(outcome, SequenceOutcome::Exhausted { attempts: 3 });
    assert_eq!(gateway.calls(), 3);
    assert_eq!(presenter.notifications(), vec![Notification::connection_failed()]);
    assert!(presenter.dialogs().is_empty());
    assert!(!ctrl.is_attempting());

    gateway.set_fallback(Step::Accept);
    let outcome = ctrl.init_connection().await.unwrap();
    assert_eq!(outcome, SequenceOutcome::Connected { attempts: 1 });
    assert_eq!(gateway.calls(), 4);
    assert_eq!(presenter.notifications().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_are_spaced_by_the_interval() {
    let gateway = FakeGateway::always(Step::Fail);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    let start = Instant::now();
    let outcome = ctrl.init_connection().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(outcome, SequenceOutcome::Exhausted { attempts: 3 });
    let offsets: Vec<_> = gateway
        .call_times()
        .iter()
        .map(|t| t.duration_since(start))
        .collect();
    assert_eq!(
        offsets,
        vec![
            Duration::ZERO,
            Duration::from_millis(1000),
            Duration::from_millis(2000),
        ]
    );
    // No wait after the last attempt.
    assert!(elapsed >= Duration::from_millis(2000));
    assert!(elapsed < Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn attempt_failures_are_reported_as_events() {
    let gateway = FakeGateway::scripted(&[Step::Fail], Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();
    assert!(ctrl.take_events().await.is_none());

    ctrl.init_connection().await.unwrap();

    let event = wait_for(&mut events, |e| {
        matches!(e, ControllerEvent::AttemptFailed { .. })
    })
    .await;
    let ControllerEvent::AttemptFailed {
        kind,
        attempt,
        next_retry,
        ..
    } = event
    else {
        unreachable!();
    };
    assert_eq!(kind, SequenceKind::Initial);
    assert_eq!(attempt, 1);
    assert_eq!(next_retry, Some(Duration::from_millis(1000)));

    wait_for(&mut events, |e| matches!(e, ControllerEvent::Listening)).await;
    let finished = wait_for(&mut events, |e| {
        matches!(e, ControllerEvent::SequenceFinished { .. })
    })
    .await;
    assert_eq!(
        finished,
        ControllerEvent::SequenceFinished {
            kind: SequenceKind::Initial,
            outcome: SequenceOutcome::Connected { attempts: 2 },
        }
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_idle_starts_one_reconnect() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();

    ctrl.init_connection().await.unwrap();
    gateway.push(&[Step::Fail]);

    assert_eq!(bus.emit_status(-1), 1);

    let finished = wait_for(&mut events, is_reconnect_finished).await;
    assert_eq!(
        finished,
        ControllerEvent::SequenceFinished {
            kind: SequenceKind::Reconnect,
            outcome: SequenceOutcome::Connected { attempts: 2 },
        }
    );
    assert_eq!(gateway.calls(), 3);
    assert_eq!(ctrl.last_status(), Some(ConnectionStatus::Disconnected));
    assert!(ctrl.attempt_state().connected);
    // Listeners were registered once and kept.
    assert_eq!(bus.listen_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn repeated_disconnects_are_coalesced_into_one_loop() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();

    ctrl.init_connection().await.unwrap();

    bus.emit_status(-1);
    bus.emit_status(-1);

    let mut reconnects_started = 0;
    let mut coalesced = 0;
    loop {
        let event = wait_for(&mut events, |_| true).await;
        match event {
            ControllerEvent::SequenceStarted {
                kind: SequenceKind::Reconnect,
            } => reconnects_started += 1,
            ControllerEvent::DisconnectCoalesced => coalesced += 1,
            ref e if is_reconnect_finished(e) => break,
            _ => {}
        }
    }
    assert_eq!(reconnects_started, 1);
    assert_eq!(coalesced, 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, ControllerEvent::SequenceStarted { .. }));
    }
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_manual_retry_is_coalesced() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();

    ctrl.init_connection().await.unwrap();

    gateway.set_delay(Duration::from_millis(500));
    let manual = {
        let ctrl = ctrl.clone();
        tokio::spawn(async move { ctrl.init_connection().await })
    };
    eventually(|| gateway.calls() == 2).await;

    bus.emit_status(-1);
    wait_for(&mut events, |e| matches!(e, ControllerEvent::DisconnectCoalesced)).await;

    let outcome = manual.await.unwrap().unwrap();
    assert_eq!(outcome, SequenceOutcome::Connected { attempts: 1 });
    assert_eq!(gateway.calls(), 2);
    assert!(ctrl.attempt_state().connected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_never_connected_does_nothing() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    ctrl.init_notifications().await.unwrap();
    bus.emit_status(-1);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(gateway.calls(), 0);
    assert_eq!(ctrl.last_status(), Some(ConnectionStatus::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn reconnect_exhaustion_notifies_and_stops() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();

    ctrl.init_connection().await.unwrap();
    gateway.set_fallback(Step::Fail);
    bus.emit_status(-1);

    let finished = wait_for(&mut events, is_reconnect_finished).await;
    assert_eq!(
        finished,
        ControllerEvent::SequenceFinished {
            kind: SequenceKind::Reconnect,
            outcome: SequenceOutcome::Exhausted { attempts: 2 },
        }
    );
    eventually(|| presenter.notifications().len() == 1).await;

    // The backend keeps reporting the failed attempts; none re-arm the loop.
    bus.emit_status(-1);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(gateway.calls(), 3);
    assert!(!ctrl.is_attempting());
}

#[tokio::test(start_paused = true)]
async fn connected_status_marks_controller_connected() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();

    ctrl.init_notifications().await.unwrap();
    bus.emit_status(1);

    let event = wait_for(&mut events, |e| matches!(e, ControllerEvent::StatusChanged(_))).await;
    assert_eq!(event, ControllerEvent::StatusChanged(ConnectionStatus::Connected));
    assert!(ctrl.attempt_state().connected);
    assert_eq!(ctrl.last_status(), Some(ConnectionStatus::Connected));
}

#[tokio::test(start_paused = true)]
async fn malformed_status_payloads_are_ignored() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();

    ctrl.init_notifications().await.unwrap();
    bus.emit("connection-state-changed", serde_json::json!({ "status": 7 }));
    bus.emit("connection-state-changed", serde_json::json!("nope"));
    bus.emit_status(0);

    let event = wait_for(&mut events, |e| matches!(e, ControllerEvent::StatusChanged(_))).await;
    assert_eq!(event, ControllerEvent::StatusChanged(ConnectionStatus::Connecting));
}

#[tokio::test(start_paused = true)]
async fn backend_error_shows_dialog() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);
    let mut events = ctrl.take_events().await.unwrap();

    ctrl.init_connection().await.unwrap();
    bus.emit("backend-error", serde_json::json!({ "message": "socket reset" }));

    let event = wait_for(&mut events, |e| matches!(e, ControllerEvent::BackendError(_))).await;
    assert_eq!(event, ControllerEvent::BackendError("socket reset".into()));

    eventually(|| presenter.dialogs().len() == 1).await;
    assert_eq!(presenter.dialogs()[0], Dialog::backend_error("socket reset"));
    assert_eq!(presenter.dialogs()[0].text, "An error occurred: socket reset");
}

#[tokio::test(start_paused = true)]
async fn subscription_failure_is_propagated() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    bus.fail_on("connection-state-changed");
    let ctrl = controller(&gateway, &bus, &presenter);

    let err = ctrl.init_connection().await.unwrap_err();

    assert!(matches!(err, ControllerError::Subscription(_)));
    assert_eq!(bus.active(), 0);
    assert!(!ctrl.is_listening());
    assert!(!ctrl.is_attempting());
}

#[tokio::test(start_paused = true)]
async fn second_registration_is_rejected() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    ctrl.init_notifications().await.unwrap();
    let err = ctrl.init_notifications().await.unwrap_err();

    assert_eq!(err, ControllerError::AlreadyListening);
    assert_eq!(bus.active(), 2);
}

#[tokio::test(start_paused = true)]
async fn teardown_releases_subscriptions_and_is_idempotent() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    ctrl.init_connection().await.unwrap();
    assert_eq!(bus.active(), 2);

    ctrl.teardown();
    assert_eq!(bus.active(), 0);
    assert!(!ctrl.is_listening());
    ctrl.teardown();
    assert_eq!(bus.active(), 0);

    // Nothing reacts to events any more.
    assert_eq!(bus.emit_status(-1), 0);
    assert_eq!(
        ctrl.init_connection().await.unwrap_err(),
        ControllerError::TornDown
    );
    assert_eq!(
        ctrl.init_notifications().await.unwrap_err(),
        ControllerError::TornDown
    );
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_without_listeners_is_a_no_op() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    ctrl.teardown();
    ctrl.teardown();
    assert!(ctrl.is_torn_down());
    assert_eq!(bus.active(), 0);
}

#[tokio::test(start_paused = true)]
async fn teardown_cancels_pending_retry_wait() {
    let gateway = FakeGateway::always(Step::Fail);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    let running = {
        let ctrl = ctrl.clone();
        tokio::spawn(async move { ctrl.init_connection().await })
    };
    eventually(|| gateway.calls() == 1).await;

    ctrl.teardown();
    let outcome = running.await.unwrap().unwrap();

    assert_eq!(outcome, SequenceOutcome::Cancelled { attempts: 1 });
    assert_eq!(gateway.calls(), 1);
    assert!(presenter.notifications().is_empty());
    assert!(!ctrl.is_attempting());
}

#[tokio::test(start_paused = true)]
async fn late_connect_result_after_teardown_is_ignored() {
    let gateway = FakeGateway::always(Step::Accept);
    gateway.set_delay(Duration::from_millis(500));
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    let running = {
        let ctrl = ctrl.clone();
        tokio::spawn(async move { ctrl.init_connection().await })
    };
    eventually(|| gateway.calls() == 1).await;

    ctrl.teardown();
    let outcome = running.await.unwrap().unwrap();

    assert_eq!(outcome, SequenceOutcome::Cancelled { attempts: 1 });
    assert_eq!(bus.listen_calls(), 0);
    assert!(!ctrl.is_listening());
    assert!(!ctrl.attempt_state().connected);
}

#[tokio::test(start_paused = true)]
async fn queued_disconnect_after_teardown_starts_nothing() {
    for _ in 0..20 {
        let gateway = FakeGateway::always(Step::Accept);
        let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
        let ctrl = controller(&gateway, &bus, &presenter);

        ctrl.init_connection().await.unwrap();
        assert_eq!(gateway.calls(), 1);

        // The report is queued before the listener task gets to run.
        assert_eq!(bus.emit_status(-1), 1);
        ctrl.teardown();

        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(gateway.calls(), 1, "connect issued after teardown");
        assert!(!ctrl.is_attempting());
        assert_ne!(ctrl.last_status(), Some(ConnectionStatus::Disconnected));
    }
}

#[tokio::test(start_paused = true)]
async fn queued_backend_error_after_teardown_shows_nothing() {
    let gateway = FakeGateway::always(Step::Accept);
    let (bus, presenter) = (FakeBus::default(), RecordingPresenter::default());
    let ctrl = controller(&gateway, &bus, &presenter);

    ctrl.init_connection().await.unwrap();
    bus.emit("backend-error", serde_json::json!({ "message": "socket reset" }));
    ctrl.teardown();

    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(presenter.dialogs().is_empty());
}
