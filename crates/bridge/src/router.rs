//! Per-event fan-out of push payloads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

type Listeners = HashMap<String, Vec<(u64, mpsc::UnboundedSender<serde_json::Value>)>>;

#[derive(Default)]
pub(crate) struct EventRouter {
    next_id: AtomicU64,
    listeners: Mutex<Listeners>,
}

impl EventRouter {
    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a listener for `event` and returns its id and receiver.
    pub(crate) fn subscribe(
        &self,
        event: &str,
    ) -> (u64, mpsc::UnboundedReceiver<serde_json::Value>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().entry(event.to_string()).or_default().push((id, tx));
        (id, rx)
    }

    pub(crate) fn unsubscribe(&self, event: &str, id: u64) {
        let mut listeners = self.lock();
        if let Some(list) = listeners.get_mut(event) {
            list.retain(|(lid, _)| *lid != id);
            if list.is_empty() {
                listeners.remove(event);
            }
        }
    }

    /// Delivers `payload` to every listener of `event`. Returns the number
    /// of listeners reached; listeners whose receiver is gone are pruned.
    pub(crate) fn dispatch(&self, event: &str, payload: &serde_json::Value) -> usize {
        let mut listeners = self.lock();
        let Some(list) = listeners.get_mut(event) else {
            return 0;
        };
        list.retain(|(_, tx)| tx.send(payload.clone()).is_ok());
        let reached = list.len();
        if reached == 0 {
            listeners.remove(event);
        }
        reached
    }

    pub(crate) fn listener_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Drops every sender so all receivers observe end-of-stream.
    pub(crate) fn close(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dispatch_reaches_only_matching_listeners() {
        let router = EventRouter::default();
        let (_, mut status) = router.subscribe("connection-state-changed");
        let (_, mut errors) = router.subscribe("backend-error");

        let reached = router.dispatch("connection-state-changed", &json!({"status": -1}));

        assert_eq!(reached, 1);
        assert_eq!(status.try_recv().unwrap(), json!({"status": -1}));
        assert!(errors.try_recv().is_err());
    }

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let router = EventRouter::default();
        let (a, _rx_a) = router.subscribe("booped");
        let (_b, mut rx_b) = router.subscribe("booped");

        router.unsubscribe("booped", a);

        assert_eq!(router.listener_count("booped"), 1);
        assert_eq!(router.dispatch("booped", &json!("Alice")), 1);
        assert_eq!(rx_b.try_recv().unwrap(), json!("Alice"));
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let router = EventRouter::default();
        let (_, rx) = router.subscribe("booped");
        drop(rx);

        assert_eq!(router.dispatch("booped", &json!(null)), 0);
        assert_eq!(router.listener_count("booped"), 0);
    }

    #[tokio::test]
    async fn close_ends_every_stream() {
        let router = EventRouter::default();
        let (_, mut rx) = router.subscribe("backend-error");
        router.close();
        assert!(rx.recv().await.is_none());
    }
}
