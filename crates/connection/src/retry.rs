//! Bounded fixed-interval retry loop shared by the initial-connect and
//! reconnect sequences.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::attempt::AttemptGuard;
use crate::controller::ControllerContext;
use crate::error::ControllerError;
use crate::gateway::{EventBus, Presenter, RpcGateway};
use crate::listeners;
use crate::types::{ControllerEvent, Dialog, Notification, SequenceOutcome};

/// Runs one connect sequence while holding `guard`.
///
/// Attempts are strictly sequential. A refusal ends the loop at once, a
/// transport failure consumes one attempt and waits the policy interval
/// before the next one, and no wait follows the last attempt. The guard is
/// released before any user-facing notice is shown, so the controller is
/// retriable while a dialog is still open.
pub(crate) async fn run_sequence<G, B, P>(
    ctx: &Arc<ControllerContext<G, B, P>>,
    guard: AttemptGuard,
) -> Result<SequenceOutcome, ControllerError>
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    let kind = guard.kind();
    let policy = ctx.policy_for(kind).clone();

    ctx.emit(ControllerEvent::SequenceStarted { kind });
    info!(
        sequence = %kind,
        interval_ms = policy.interval.as_millis() as u64,
        max_attempts = ?policy.max_attempts,
        "starting connection sequence"
    );

    let mut attempts = 0;
    let outcome = loop {
        if ctx.is_torn_down() {
            debug!(sequence = %kind, "controller torn down, not attempting");
            break SequenceOutcome::Cancelled { attempts };
        }

        let attempt = guard.record_attempt();
        attempts = attempt;
        debug!(sequence = %kind, attempt, "attempting connection");

        let result = ctx.gateway.connect().await;

        // A torn-down controller must not act on late results.
        if ctx.is_torn_down() {
            debug!(sequence = %kind, attempt, "controller torn down, ignoring connect result");
            break SequenceOutcome::Cancelled { attempts: attempt };
        }

        match result {
            Ok(true) => {
                // Listeners go up before the guard is released so a
                // disconnect racing the registration cannot start a
                // second loop.
                listeners::ensure_listening(ctx).await?;
                info!(sequence = %kind, attempts = attempt, "connected to boop server");
                break SequenceOutcome::Connected { attempts: attempt };
            }
            Ok(false) => {
                warn!(sequence = %kind, attempt, "login was refused by server");
                break SequenceOutcome::Refused { attempts: attempt };
            }
            Err(e) => {
                let exhausted = policy.is_exhausted(attempt);
                let next_retry = (!exhausted).then_some(policy.interval);
                warn!(
                    sequence = %kind,
                    attempt,
                    error = %e,
                    "connection attempt failed"
                );
                ctx.emit(ControllerEvent::AttemptFailed {
                    kind,
                    attempt,
                    error: e.to_string(),
                    next_retry,
                });

                if exhausted {
                    warn!(sequence = %kind, attempts = attempt, "all connection attempts failed");
                    break SequenceOutcome::Exhausted { attempts: attempt };
                }

                tokio::select! {
                    biased;
                    _ = ctx.cancel.cancelled() => {
                        debug!(sequence = %kind, "retry wait cancelled");
                        break SequenceOutcome::Cancelled { attempts: attempt };
                    }
                    _ = tokio::time::sleep(policy.interval) => {}
                }
            }
        }
    };

    guard.finish(matches!(outcome, SequenceOutcome::Connected { .. }));
    ctx.emit(ControllerEvent::SequenceFinished { kind, outcome });

    match outcome {
        SequenceOutcome::Refused { .. } => {
            ctx.presenter.show_dialog(Dialog::credentials_refused()).await;
        }
        SequenceOutcome::Exhausted { .. } if policy.notify_on_exhaustion => {
            ctx.presenter
                .send_notification(Notification::connection_failed());
        }
        _ => {}
    }

    Ok(outcome)
}

/// Spawns a reconnect loop on the runtime.
pub(crate) fn spawn_reconnect<G, B, P>(ctx: Arc<ControllerContext<G, B, P>>, guard: AttemptGuard)
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    tokio::spawn(async move {
        if let Err(e) = run_sequence(&ctx, guard).await {
            tracing::error!(error = %e, "reconnect sequence failed");
        }
    });
}
