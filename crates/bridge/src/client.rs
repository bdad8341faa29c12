//! Bridge client for client-to-backend invokes and backend push events.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use boop_connection::{BusError, EventBus, ListenGuard, RpcError, RpcGateway, Subscription};
use boop_protocol::constants::{BRIDGE_REQUEST_TIMEOUT, MessageType};
use boop_protocol::envelope::Message;

use crate::router::EventRouter;

/// Requests waiting for their reply, keyed by id.
pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// Errors from the bridge client.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request timed out")]
    Timeout,

    #[error("bridge closed")]
    Closed,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid reply: {0}")]
    InvalidReply(String),
}

impl From<BridgeError> for RpcError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::Timeout => RpcError::Timeout,
            BridgeError::Closed => RpcError::Closed,
            BridgeError::Backend(message) => RpcError::Backend(message),
            other => RpcError::Transport(other.to_string()),
        }
    }
}

struct Inner {
    write_tx: mpsc::Sender<String>,
    pending: PendingMap,
    router: Arc<EventRouter>,
    /// Cancelled by [`BridgeClient::close`] and on drop.
    cancel: CancellationToken,
    /// Cancelled by the read pump once the backend stream is gone.
    closed: CancellationToken,
    read_handle: tokio::task::JoinHandle<()>,
    write_handle: tokio::task::JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.read_handle.abort();
        self.write_handle.abort();
    }
}

/// Client end of the backend bridge. Cloning is cheap.
#[derive(Clone)]
pub struct BridgeClient {
    inner: Arc<Inner>,
}

impl BridgeClient {
    /// Starts the pumps over the given backend streams.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (write_tx, write_rx) = mpsc::channel::<String>(256);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let router = Arc::new(EventRouter::default());
        let cancel = CancellationToken::new();
        let closed = CancellationToken::new();

        let write_handle = {
            let cancel = cancel.clone();
            tokio::spawn(crate::pumps::write::write_pump(writer, write_rx, cancel))
        };

        let read_handle = {
            let pending = pending.clone();
            let router = router.clone();
            let cancel = cancel.clone();
            let closed = closed.clone();
            tokio::spawn(crate::pumps::read::read_pump(
                BufReader::new(reader),
                pending,
                router,
                cancel,
                closed,
            ))
        };

        Self {
            inner: Arc::new(Inner {
                write_tx,
                pending,
                router,
                cancel,
                closed,
                read_handle,
                write_handle,
            }),
        }
    }

    /// Sends a request and waits for the reply.
    pub async fn send_request<T: serde::Serialize>(
        &self,
        msg_type: MessageType,
        payload: Option<&T>,
    ) -> Result<Message, BridgeError> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let msg = Message::new(&id, msg_type, payload)?;
        let json = serde_json::to_string(&msg)?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().await.insert(id.clone(), tx);

        if self.inner.write_tx.send(json).await.is_err() {
            self.inner.pending.lock().await.remove(&id);
            return Err(BridgeError::Closed);
        }

        // The read pump may drain the pending map between the closed check
        // and the insert, so stream end is watched alongside the reply.
        let result = tokio::select! {
            biased;
            reply = tokio::time::timeout(BRIDGE_REQUEST_TIMEOUT, rx) => match reply {
                Ok(Ok(resp)) => Ok(resp),
                Ok(Err(_)) => Err(BridgeError::Closed),
                Err(_) => Err(BridgeError::Timeout),
            },
            _ = self.inner.closed.cancelled() => Err(BridgeError::Closed),
        };

        // Clean up pending entry on any exit path.
        self.inner.pending.lock().await.remove(&id);

        let resp = result?;
        if let Some(err) = &resp.error {
            return Err(BridgeError::Backend(err.message.clone()));
        }
        Ok(resp)
    }

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.router.listener_count(event)
    }

    /// Whether the backend stream has ended or the client was closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled() || self.inner.cancel.is_cancelled()
    }

    /// Resolves once the backend stream has ended.
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await;
    }

    /// Stops both pumps and closes the backend's input.
    pub fn close(&self) {
        debug!("closing bridge");
        self.inner.cancel.cancel();
    }
}

impl RpcGateway for BridgeClient {
    async fn connect(&self) -> Result<bool, RpcError> {
        let reply = self.send_request::<()>(MessageType::Connect, None).await?;
        match reply.parse_payload::<bool>() {
            Ok(Some(accepted)) => Ok(accepted),
            Ok(None) => {
                Err(BridgeError::InvalidReply("connect reply without payload".into()).into())
            }
            Err(e) => Err(BridgeError::InvalidReply(e.to_string()).into()),
        }
    }

    async fn disconnect(&self) -> Result<(), RpcError> {
        self.send_request::<()>(MessageType::Disconnect, None).await?;
        Ok(())
    }
}

impl EventBus for BridgeClient {
    async fn listen(&self, event: &str) -> Result<Subscription, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }

        let (id, rx) = self.inner.router.subscribe(event);
        let router = self.inner.router.clone();
        let name = event.to_string();
        let guard = ListenGuard::new(event, move || router.unsubscribe(&name, id));
        debug!(event, "listener registered");
        Ok(Subscription::new(rx, guard))
    }
}
