//! Event-boundary listeners: backend errors and connection status changes.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use boop_protocol::constants::{EVENT_BACKEND_ERROR, EVENT_CONNECTION_STATE_CHANGED};
use boop_protocol::{BackendErrorPayload, ConnectionStatus, ConnectionStatusPayload};

use crate::attempt::DisconnectAction;
use crate::controller::ControllerContext;
use crate::error::ControllerError;
use crate::gateway::{EventBus, EventReceiver, Presenter, RpcGateway};
use crate::retry::spawn_reconnect;
use crate::types::{ControllerEvent, Dialog};

/// Registers both listeners and spawns their tasks.
///
/// Subscriptions are acquired before anything is installed; if the second
/// `listen` fails, the first handle is dropped and thereby released.
pub(crate) async fn register<G, B, P>(
    ctx: &Arc<ControllerContext<G, B, P>>,
) -> Result<(), ControllerError>
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    if ctx.is_torn_down() {
        return Err(ControllerError::TornDown);
    }
    if ctx.is_listening() {
        return Err(ControllerError::AlreadyListening);
    }

    let errors = ctx.bus.listen(EVENT_BACKEND_ERROR).await?;
    let status = ctx.bus.listen(EVENT_CONNECTION_STATE_CHANGED).await?;
    let (errors_rx, errors_guard) = errors.into_parts();
    let (status_rx, status_guard) = status.into_parts();

    {
        let mut listeners = match ctx.listeners.lock() {
            Ok(l) => l,
            Err(e) => e.into_inner(),
        };
        // Teardown or a concurrent registration may have happened while we
        // were awaiting the bus; the fresh guards are released on return.
        if ctx.is_torn_down() {
            return Err(ControllerError::TornDown);
        }
        if listeners.is_some() {
            return Err(ControllerError::AlreadyListening);
        }
        *listeners = Some(vec![errors_guard, status_guard]);
    }

    tokio::spawn(backend_error_loop(ctx.clone(), errors_rx));
    tokio::spawn(status_loop(ctx.clone(), status_rx));

    info!("listening to backend events");
    ctx.emit(ControllerEvent::Listening);
    Ok(())
}

/// Registers the listeners unless they are already up.
pub(crate) async fn ensure_listening<G, B, P>(
    ctx: &Arc<ControllerContext<G, B, P>>,
) -> Result<(), ControllerError>
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    match register(ctx).await {
        Ok(()) | Err(ControllerError::AlreadyListening) | Err(ControllerError::TornDown) => Ok(()),
        Err(e) => {
            error!(error = %e, "failed to register event listeners");
            Err(e)
        }
    }
}

async fn backend_error_loop<G, B, P>(ctx: Arc<ControllerContext<G, B, P>>, mut rx: EventReceiver)
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    loop {
        let payload = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            payload = rx.recv() => match payload {
                Some(p) => p,
                None => {
                    debug!("backend-error subscription closed");
                    break;
                }
            },
        };

        let message = match serde_json::from_value::<BackendErrorPayload>(payload) {
            Ok(p) => p.message,
            Err(e) => {
                warn!("malformed backend-error payload: {e}");
                continue;
            }
        };

        if ctx.is_torn_down() {
            break;
        }

        error!(message = %message, "backend reported an error");
        ctx.emit(ControllerEvent::BackendError(message.clone()));

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            () = ctx.presenter.show_dialog(Dialog::backend_error(&message)) => {}
        }
    }
}

async fn status_loop<G, B, P>(ctx: Arc<ControllerContext<G, B, P>>, mut rx: EventReceiver)
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    loop {
        let payload = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            payload = rx.recv() => match payload {
                Some(p) => p,
                None => {
                    debug!("connection-state-changed subscription closed");
                    break;
                }
            },
        };
        handle_status(&ctx, payload);
    }
}

/// Mirrors a status report and re-arms the controller on disconnect.
fn handle_status<G, B, P>(ctx: &Arc<ControllerContext<G, B, P>>, payload: serde_json::Value)
where
    G: RpcGateway,
    B: EventBus,
    P: Presenter,
{
    if ctx.is_torn_down() {
        return;
    }

    let status = match serde_json::from_value::<ConnectionStatusPayload>(payload) {
        Ok(p) => match p.status() {
            Ok(s) => s,
            Err(e) => {
                warn!("ignoring status report: {e}");
                return;
            }
        },
        Err(e) => {
            warn!("malformed connection-state-changed payload: {e}");
            return;
        }
    };

    debug!(status = ?status, "connection status changed");
    ctx.set_last_status(status);
    ctx.emit(ControllerEvent::StatusChanged(status));

    match status {
        ConnectionStatus::Connected => ctx.attempts.set_connected(true),
        ConnectionStatus::Connecting => {}
        ConnectionStatus::Disconnected => match ctx.attempts.on_disconnect() {
            DisconnectAction::Reconnect(guard) => {
                info!("connection to boop server lost, reconnecting");
                spawn_reconnect(ctx.clone(), guard);
            }
            DisconnectAction::Coalesced => {
                debug!("disconnect reported while a connection loop is running, dropping");
                ctx.emit(ControllerEvent::DisconnectCoalesced);
            }
            DisconnectAction::NotConnected => {
                debug!("disconnect reported while not connected, nothing to re-establish");
            }
        },
    }
}
