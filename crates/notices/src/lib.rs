//! User-facing notices for the boop shell.
//!
//! Dialogs block until acknowledged; notifications are fire-and-forget.
//! Rendering and auto-dismissal belong to whatever front end drains the
//! board.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tokio::sync::oneshot;

/// Whether a notice blocks the flow that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Dialog,
    Notification,
}

/// Visual category of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn label(self) -> &'static str {
        match self {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Local>,
}

/// Notifications kept before the oldest are evicted.
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 100;

/// In-memory notice queue with monotonic ID assignment.
///
/// Each dialog holds an acknowledgment sender; the receiver handed out by
/// [`NoticeBoard::push_dialog`] resolves once the dialog is acknowledged,
/// dismissed, or the board is dropped. Notifications are bounded and the
/// oldest ones are evicted first; dialogs stay until acknowledged.
#[derive(Debug)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    acks: HashMap<u64, oneshot::Sender<()>>,
    next_id: u64,
    max_notifications: usize,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::with_max_notifications(DEFAULT_MAX_NOTIFICATIONS)
    }
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_notifications(max: usize) -> Self {
        Self {
            notices: Vec::new(),
            acks: HashMap::new(),
            next_id: 0,
            max_notifications: max.max(1),
        }
    }

    fn push(
        &mut self,
        kind: NoticeKind,
        level: NoticeLevel,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.notices.push(Notice {
            id,
            kind,
            level,
            title: title.into(),
            body: body.into(),
            created_at: Local::now(),
        });
        id
    }

    /// Queues a blocking dialog. Returns its ID and the acknowledgment
    /// receiver.
    pub fn push_dialog(
        &mut self,
        level: NoticeLevel,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> (u64, oneshot::Receiver<()>) {
        let id = self.push(NoticeKind::Dialog, level, title, body);
        let (tx, rx) = oneshot::channel();
        self.acks.insert(id, tx);
        (id, rx)
    }

    /// Queues a non-blocking notification.
    pub fn push_notification(
        &mut self,
        level: NoticeLevel,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> u64 {
        let id = self.push(NoticeKind::Notification, level, title, body);
        self.evict_notifications();
        id
    }

    fn evict_notifications(&mut self) {
        let count = self
            .notices
            .iter()
            .filter(|n| n.kind == NoticeKind::Notification)
            .count();
        let mut excess = count.saturating_sub(self.max_notifications);
        if excess == 0 {
            return;
        }
        self.notices.retain(|n| {
            if excess > 0 && n.kind == NoticeKind::Notification {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }

    /// Acknowledges a dialog and removes it. Returns `false` when `id` is
    /// not a pending dialog.
    pub fn acknowledge(&mut self, id: u64) -> bool {
        let Some(tx) = self.acks.remove(&id) else {
            return false;
        };
        self.notices.retain(|n| n.id != id);
        let _ = tx.send(());
        true
    }

    /// Acknowledges the oldest pending dialog, if any.
    pub fn acknowledge_oldest(&mut self) -> Option<u64> {
        let id = self.pending_dialogs().next()?.id;
        self.acknowledge(id).then_some(id)
    }

    /// Removes a notice of either kind. A dismissed dialog releases its
    /// waiter without an acknowledgment.
    pub fn dismiss(&mut self, id: u64) -> bool {
        self.acks.remove(&id);
        let len_before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != len_before
    }

    /// Dialogs still waiting for acknowledgment, oldest first.
    pub fn pending_dialogs(&self) -> impl Iterator<Item = &Notice> {
        self.notices
            .iter()
            .filter(|n| n.kind == NoticeKind::Dialog)
    }

    pub fn get(&self, id: u64) -> Option<&Notice> {
        self.notices.iter().find(|n| n.id == id)
    }

    /// Iterate over notices in insertion order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    /// Remove all notices, releasing every dialog waiter.
    pub fn clear(&mut self) {
        self.notices.clear();
        self.acks.clear();
    }
}
