//! Bridge read pump: routes replies and dispatches push events.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use boop_protocol::constants::BRIDGE_MAX_LINE_SIZE;
use boop_protocol::envelope::Message;

use crate::client::PendingMap;
use crate::router::EventRouter;

/// One read from the backend stream.
#[derive(Debug, PartialEq)]
pub(crate) enum Line {
    Text(String),
    /// A line over the size limit; carries the number of bytes skipped.
    Oversized(usize),
    Eof,
}

/// Reads one newline-terminated line, never buffering more than
/// [`BRIDGE_MAX_LINE_SIZE`] bytes of it.
pub(crate) async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    let limit = BRIDGE_MAX_LINE_SIZE as u64 + 1;

    buf.clear();
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(Line::Eof);
    }

    if buf.last() != Some(&b'\n') && buf.len() > BRIDGE_MAX_LINE_SIZE {
        let mut skipped = buf.len();
        loop {
            buf.clear();
            let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
            skipped += n;
            if n == 0 || buf.last() == Some(&b'\n') {
                break;
            }
        }
        return Ok(Line::Oversized(skipped));
    }

    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Line::Text(String::from_utf8_lossy(buf).into_owned()))
}

/// Reads lines from the backend until EOF, a read error or cancellation.
///
/// On exit `closed` is cancelled, every pending request fails and every
/// listener stream ends.
pub(crate) async fn read_pump<R>(
    mut reader: R,
    pending: PendingMap,
    router: Arc<EventRouter>,
    cancel: CancellationToken,
    closed: CancellationToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = read_line(&mut reader, &mut buf) => line,
        };

        match line {
            Ok(Line::Text(text)) => handle_line(&text, &pending, &router).await,
            Ok(Line::Oversized(len)) => {
                warn!("line too large ({len} bytes), dropping");
            }
            Ok(Line::Eof) => {
                debug!("backend output ended");
                break;
            }
            Err(e) => {
                warn!("bridge read error: {e}");
                break;
            }
        }
    }

    closed.cancel();
    pending.lock().await.clear();
    router.close();
}

/// Handles one line from the backend.
pub(crate) async fn handle_line(text: &str, pending: &PendingMap, router: &EventRouter) {
    if text.trim().is_empty() {
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse bridge message: {e}");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "received message");

    if msg.msg_type.is_response() {
        match pending.lock().await.remove(&msg.id) {
            Some(tx) => {
                let _ = tx.send(msg);
            }
            None => debug!(id = %msg.id, "reply for unknown or expired request"),
        }
        return;
    }

    let Some(event) = msg.msg_type.event_name() else {
        warn!(msg_type = ?msg.msg_type, "unexpected message from backend, dropping");
        return;
    };

    let payload = match &msg.payload {
        Some(raw) => match serde_json::from_str(raw.get()) {
            Ok(v) => v,
            Err(e) => {
                warn!(event, "undecodable event payload: {e}");
                return;
            }
        },
        None => serde_json::Value::Null,
    };

    if router.dispatch(event, &payload) == 0 {
        trace!(event, "no listener for event");
    }
}
